//! Top-level entry point for running magscope as a native window.

use std::sync::Arc;

use eframe::egui;

use crate::adapters::broker::BrokerClientResolver;
use crate::color_scheme::Theme;
use crate::config::AppConfig;
use crate::error::StartupError;
use crate::events::EventController;
use crate::persistence::{JsonFileStore, StateStore};
use crate::workspace::Workspace;

use super::MagApp;

/// Open the persisted state store, falling back to memory when no directory is usable.
fn open_state(config: &AppConfig) -> StateStore {
    let state = match JsonFileStore::in_dir(config.data_dir.as_deref()) {
        Some(store) => {
            tracing::info!(path = %store.path().display(), "using state file");
            StateStore::new(Box::new(store))
        }
        None => {
            tracing::warn!("no config directory available; state will not be saved");
            StateStore::in_memory()
        }
    };
    state.with_recent_cap(config.recent_cap)
}

/// Launch magscope in a native window.
///
/// 1. Starts the I/O runtime that hosts every adapter (one worker thread).
/// 2. Resolves strict offline mode and the broker client.
/// 3. Restores the persisted panes and theme, then enters the eframe event loop.
///
/// The call blocks until the window is closed.
pub fn run_magscope(config: AppConfig) -> Result<(), StartupError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("magscope-io")
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    let state = open_state(&config);
    let strict_offline = config.strict_offline(state.strict_offline());
    if strict_offline {
        tracing::info!("strict offline mode enabled");
    }
    let workspace = Workspace::new(
        &config,
        runtime.handle().clone(),
        BrokerClientResolver::new(strict_offline),
        EventController::new(),
    );
    let stored_theme = state.load_theme();

    let mut viewport = egui::ViewportBuilder::default()
        .with_title(config.title.clone())
        .with_inner_size(egui::vec2(config.window_size[0], config.window_size[1]));
    if let Some(icon) = load_app_icon_svg() {
        viewport = viewport.with_icon(icon);
    }
    let opts = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let title = config.title.clone();
    eframe::run_native(
        &title,
        opts,
        Box::new(move |cc| {
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);

            let theme = stored_theme.unwrap_or_else(|| {
                Theme::from_system(cc.egui_ctx.system_theme().map(|t| t == egui::Theme::Dark))
            });

            let mut app = MagApp::new(config, runtime, workspace, state, theme);
            let ctx = cc.egui_ctx.clone();
            app.workspace.set_repaint(Arc::new(move || ctx.request_repaint()));
            Ok(Box::new(app))
        }),
    )?;
    Ok(())
}

/// Render the bundled `icon.svg` into an [`egui::IconData`].
fn load_app_icon_svg() -> Option<egui::IconData> {
    let data = include_bytes!("../../icon.svg");

    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &opt).ok()?;
    let size = tree.size().to_int_size();
    if size.width() == 0 || size.height() == 0 {
        return None;
    }
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())?;
    let mut canvas = pixmap.as_mut();
    resvg::render(&tree, tiny_skia::Transform::default(), &mut canvas);
    Some(egui::IconData {
        rgba: pixmap.take(),
        width: size.width(),
        height: size.height(),
    })
}
