//! Native window for magscope.
//!
//! | Sub-module     | Responsibility |
//! | -------------- | -------------- |
//! | [`pane_ui`]    | Source form (transport inputs, recent values, connect) and the pane splitter |
//! | [`charts`]     | Painting a [`render::Frame`](crate::render::Frame) with the egui painter |
//! | [`history_ui`] | Most-recent-first sample table and export button |
//! | [`run`]        | [`run_magscope()`] entry point, runtime and icon loading |
//!
//! The app owns the [`Workspace`] and drains its adapter channel once per frame, so every
//! store mutation and every draw happens on the UI thread.

mod charts;
mod history_ui;
mod pane_ui;
mod run;

pub use run::run_magscope;

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use eframe::egui;

use crate::adapters::device;
use crate::adapters::ConnectRequest;
use crate::color_scheme::Theme;
use crate::config::AppConfig;
use crate::data::export;
use crate::events::{EventFilter, EventKind, PaneEvent};
use crate::persistence::{RecentKind, StateStore};
use crate::source::SourceId;
use crate::workspace::Workspace;

use self::pane_ui::{PaneAction, PaneForm};

/// How long a status message stays in the bottom bar.
const STATUS_TTL: Duration = Duration::from_secs(6);

pub struct MagApp {
    config: AppConfig,
    workspace: Workspace,
    state: StateStore,
    /// Layout-affecting pane events; each batch triggers one save.
    layout_rx: Receiver<PaneEvent>,

    theme: Theme,
    theme_applied: bool,
    /// Config tab is shown instead of the active pane.
    show_config: bool,
    strict_offline_pref: bool,

    forms: HashMap<SourceId, PaneForm>,
    recent: HashMap<RecentKind, Vec<String>>,
    ports: Vec<String>,

    status: Option<(String, Instant)>,
    confirm_close: bool,
    allow_close: bool,

    // Keeps adapter tasks alive; dropped after the workspace.
    _runtime: tokio::runtime::Runtime,
}

impl MagApp {
    /// Restore the persisted panes into `workspace` and build the app around it.
    pub fn new(
        config: AppConfig,
        runtime: tokio::runtime::Runtime,
        mut workspace: Workspace,
        state: StateStore,
        theme: Theme,
    ) -> Self {
        let layout_rx = workspace
            .events()
            .subscribe(EventFilter::only(EventKind::LAYOUT));
        workspace.restore(state.load_panes());

        let recent = RecentKind::ALL
            .iter()
            .map(|k| (*k, state.recent(*k)))
            .collect();
        let strict_offline_pref = config.strict_offline(state.strict_offline());

        Self {
            config,
            workspace,
            state,
            layout_rx,
            theme,
            theme_applied: false,
            show_config: false,
            strict_offline_pref,
            forms: HashMap::new(),
            recent,
            ports: device::available_ports(),
            status: None,
            confirm_close: false,
            allow_close: false,
            _runtime: runtime,
        }
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some((msg.into(), Instant::now()));
    }

    fn persist_layout(&mut self) {
        if self.layout_rx.try_iter().count() == 0 {
            return;
        }
        if let Err(err) = self.state.save_panes(&self.workspace.layout()) {
            tracing::warn!(%err, "failed to save pane layout");
            self.set_status(format!("Could not save layout: {err}"));
        }
    }

    fn set_theme(&mut self, ctx: &egui::Context, theme: Theme, persist: bool) {
        self.theme = theme;
        theme.apply(ctx);
        if persist {
            if let Err(err) = self.state.save_theme(theme) {
                tracing::warn!(%err, "failed to save theme");
                self.set_status(format!("Could not save theme: {err}"));
            }
        }
    }

    fn remember(&mut self, kind: RecentKind, value: &str) {
        match self.state.push_recent(kind, value) {
            Ok(list) => {
                self.recent.insert(kind, list);
            }
            Err(err) => tracing::warn!(key = kind.key(), %err, "failed to save recent value"),
        }
    }

    fn connect(&mut self, id: &SourceId, request: ConnectRequest) {
        match &request {
            ConnectRequest::Socket { url } => self.remember(RecentKind::SocketUrl, url),
            ConnectRequest::File { path, .. } => {
                self.remember(RecentKind::FileName, &path.display().to_string())
            }
            ConnectRequest::Device { path, .. } => self.remember(RecentKind::DevicePath, path),
            ConnectRequest::Broker(params) => {
                self.remember(RecentKind::BrokerHost, &params.host);
                self.remember(RecentKind::BrokerTopic, &params.topic);
            }
        }
        self.workspace.connect(id, request);
    }

    fn export(&mut self, id: &SourceId) {
        let Some(source) = self.workspace.source(id) else {
            return;
        };
        if source.store().is_empty() {
            self.set_status("Nothing to export yet");
            return;
        }
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(source.export_file_name())
            .add_filter("JSON lines", &["jsonl"])
            .save_file()
        else {
            return;
        };
        match export::save_jsonl(&path, source.store()) {
            Ok(()) => {
                let shown = path.display().to_string();
                tracing::info!(source = %id, path = %shown, samples = source.store().len(), "exported history");
                self.workspace.note_export(id, &shown);
                self.set_status(format!("Exported to {shown}"));
            }
            Err(err) => {
                tracing::error!(source = %id, %err, "export failed");
                self.set_status(format!("Export failed: {err}"));
            }
        }
    }

    fn apply_pane_action(&mut self, id: &SourceId, action: PaneAction) {
        match action {
            PaneAction::SelectMode(mode) => {
                if let Some(source) = self.workspace.source_mut(id) {
                    source.select_mode(mode);
                }
            }
            PaneAction::Connect(request) => self.connect(id, request),
            PaneAction::Invalid(reason) => self.workspace.fail(id, reason),
            PaneAction::Disconnect => self.workspace.disconnect(id),
            PaneAction::RefreshPorts => self.ports = device::available_ports(),
            PaneAction::Export => self.export(id),
            PaneAction::Resized(width) => self.workspace.set_left_width(id, width),
        }
    }

    // ── Top bar ─────────────────────────────────────────────────────────────

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("magscope_tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let collapse = ui
                    .add_enabled(
                        !self.show_config,
                        egui::Button::new(egui_phosphor::regular::SIDEBAR),
                    )
                    .on_hover_text("Toggle the source panel (Ctrl/Cmd+Shift+C)");
                if collapse.clicked() {
                    self.workspace.toggle_active_collapsed();
                }
                ui.separator();

                let mut activate = None;
                let mut close = None;
                let active = self.workspace.active_id().cloned();
                for source in self.workspace.sources() {
                    let selected = !self.show_config && active.as_ref() == Some(source.id());
                    let text = match source.state() {
                        s if s.is_active() => {
                            format!("{} {}", egui_phosphor::regular::BROADCAST, source.label())
                        }
                        _ => source.label().to_string(),
                    };
                    if ui.selectable_label(selected, text).clicked() {
                        activate = Some(source.id().clone());
                    }
                    if source.closable()
                        && ui
                            .small_button(egui_phosphor::regular::X)
                            .on_hover_text("Close this source")
                            .clicked()
                    {
                        close = Some(source.id().clone());
                    }
                }
                if ui
                    .button(egui_phosphor::regular::PLUS)
                    .on_hover_text("New source")
                    .clicked()
                {
                    self.workspace.add_idle(true);
                    self.show_config = false;
                }
                if ui
                    .selectable_label(
                        self.show_config,
                        format!("{} Config", egui_phosphor::regular::GEAR),
                    )
                    .clicked()
                {
                    self.show_config = true;
                }

                if let Some(id) = activate {
                    self.workspace.activate(&id);
                    self.show_config = false;
                }
                if let Some(id) = close {
                    self.forms.remove(&id);
                    self.workspace.remove_source(&id);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let icon = match self.theme {
                        Theme::Dark => egui_phosphor::regular::SUN,
                        Theme::Light => egui_phosphor::regular::MOON,
                    };
                    if ui.button(icon).on_hover_text("Toggle theme").clicked() {
                        self.set_theme(ctx, self.theme.toggled(), true);
                    }
                });
            });
        });
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        if self
            .status
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() > STATUS_TTL)
        {
            self.status = None;
        }
        let Some((msg, _)) = &self.status else {
            return;
        };
        egui::TopBottomPanel::bottom("magscope_status").show(ctx, |ui| {
            ui.label(msg);
        });
        ctx.request_repaint_after(Duration::from_millis(500));
    }

    fn config_tab(&mut self, ui: &mut egui::Ui) {
        ui.heading("Config");
        ui.add_space(8.0);
        let mut theme = self.theme;
        egui::ComboBox::from_label("Theme")
            .selected_text(theme.label())
            .show_ui(ui, |ui| {
                for t in Theme::all() {
                    ui.selectable_value(&mut theme, *t, t.label());
                }
            });
        if theme != self.theme {
            self.set_theme(ui.ctx(), theme, false);
        }
        ui.checkbox(&mut self.strict_offline_pref, "Strict offline (applies on restart)")
            .on_hover_text("Never fall back to a broker client that is not bundled");
        ui.add_space(8.0);
        if ui.button("Save").clicked() {
            let saved = self
                .state
                .save_theme(self.theme)
                .and_then(|()| self.state.set_strict_offline(self.strict_offline_pref));
            match saved {
                Ok(()) => self.set_status("Settings saved"),
                Err(err) => {
                    tracing::warn!(%err, "failed to save settings");
                    self.set_status(format!("Could not save settings: {err}"));
                }
            }
        }
    }

    fn close_guard(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.viewport().close_requested())
            && !self.allow_close
            && self.workspace.has_data()
        {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.confirm_close = true;
        }
        if !self.confirm_close {
            return;
        }
        egui::Window::new("Unsaved data")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Some sources hold samples that have not been exported. Quit anyway?");
                ui.horizontal(|ui| {
                    if ui.button("Quit").clicked() {
                        self.allow_close = true;
                        self.confirm_close = false;
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                    if ui.button("Cancel").clicked() {
                        self.confirm_close = false;
                    }
                });
            });
    }
}

impl eframe::App for MagApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.theme_applied {
            self.theme.apply(ctx);
            self.theme_applied = true;
        }

        // Apply everything the adapters delivered since the last frame, then draw once.
        self.workspace.drain();

        let collapse = egui::KeyboardShortcut::new(
            egui::Modifiers::COMMAND | egui::Modifiers::SHIFT,
            egui::Key::C,
        );
        if !self.show_config && ctx.input_mut(|i| i.consume_shortcut(&collapse)) {
            self.workspace.toggle_active_collapsed();
        }

        self.top_bar(ctx);
        self.status_bar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.show_config {
                self.config_tab(ui);
                return;
            }
            let Some(id) = self.workspace.active_id().cloned() else {
                return;
            };
            if let Some(action) = self.pane(ui, &id) {
                self.apply_pane_action(&id, action);
            }
        });

        self.persist_layout();
        self.close_guard(ctx);

        // Keep the spinner and progress label moving while a file loads.
        if self
            .workspace
            .active()
            .is_some_and(|s| s.progress().is_some())
        {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
