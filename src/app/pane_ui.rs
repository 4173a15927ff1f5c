//! One source pane: the resizable config side panel with the transport form, and the
//! charts / history area next to it.

use std::collections::HashMap;
use std::path::PathBuf;

use eframe::egui;

use crate::adapters::broker::BrokerParams;
use crate::adapters::{device, socket, ConnectRequest, TransportMode};
use crate::error::ConfigError;
use crate::persistence::RecentKind;
use crate::source::{ConnectionState, Source, SourceId};

use super::{charts, history_ui, MagApp};

/// Default width of the config side panel, points.
pub const DEFAULT_SIDE_WIDTH: f32 = 360.0;
/// Narrowest the config side panel gets.
pub const MIN_SIDE_WIDTH: f32 = 240.0;
/// Room always left for the charts next to the side panel.
pub const MIN_CHART_AREA: f32 = 320.0;

/// Side panel width for `stored` inside `available` points.
pub fn clamp_side_width(stored: Option<f32>, available: f32) -> f32 {
    let max = (available - MIN_CHART_AREA).max(MIN_SIDE_WIDTH);
    stored.unwrap_or(DEFAULT_SIDE_WIDTH).clamp(MIN_SIDE_WIDTH, max)
}

/// What the user asked for while the pane was drawn.
#[derive(Debug)]
pub enum PaneAction {
    SelectMode(TransportMode),
    Connect(ConnectRequest),
    /// The form could not be turned into a request.
    Invalid(String),
    Disconnect,
    RefreshPorts,
    Export,
    Resized(f32),
}

/// Raw form input of one pane. Kept as typed text until Connect is pressed.
#[derive(Debug, Clone)]
pub struct PaneForm {
    pub socket_url: String,
    pub file_path: String,
    pub skip_lines: usize,
    pub device_path: String,
    pub baud_rate: u32,
    pub broker_host: String,
    pub broker_port: String,
    pub broker_path: String,
    pub broker_topic: String,
    pub broker_tls: bool,
    pub broker_user: String,
    pub broker_password: String,
}

impl PaneForm {
    pub fn new(broker: &BrokerParams) -> Self {
        Self {
            socket_url: String::new(),
            file_path: String::new(),
            skip_lines: 0,
            device_path: String::new(),
            baud_rate: device::DEFAULT_BAUD_RATE,
            broker_host: broker.host.clone(),
            broker_port: broker.port.to_string(),
            broker_path: broker.path.clone(),
            broker_topic: broker.topic.clone(),
            broker_tls: broker.tls,
            broker_user: String::new(),
            broker_password: String::new(),
        }
    }

    /// Build the request for `mode` from the current input.
    pub fn request(&self, mode: TransportMode) -> Result<ConnectRequest, ConfigError> {
        match mode {
            TransportMode::Unset => Err(ConfigError::InvalidEndpoint("select a source type".into())),
            TransportMode::Socket => {
                let url = self.socket_url.trim();
                socket::validate_url(url)?;
                Ok(ConnectRequest::Socket { url: url.to_string() })
            }
            TransportMode::File => match self.file_path.trim() {
                "" => Err(ConfigError::InvalidEndpoint("choose a file".into())),
                path => Ok(ConnectRequest::File {
                    path: PathBuf::from(path),
                    skip_lines: self.skip_lines,
                }),
            },
            TransportMode::Device => match self.device_path.trim() {
                "" => Err(ConfigError::InvalidEndpoint("choose a device".into())),
                path => Ok(ConnectRequest::Device {
                    path: path.to_string(),
                    baud_rate: self.baud_rate.max(1),
                }),
            },
            TransportMode::Broker => BrokerParams::from_form(
                &self.broker_host,
                &self.broker_port,
                &self.broker_path,
                &self.broker_topic,
                self.broker_tls,
                &self.broker_user,
                &self.broker_password,
            )
            .map(ConnectRequest::Broker),
        }
    }
}

/// A file load is running: Connect is replaced by a progress label.
fn loading(source: &Source) -> Option<u64> {
    match source.state() {
        ConnectionState::Connecting | ConnectionState::Streaming
            if source.mode() == TransportMode::File =>
        {
            source.progress()
        }
        _ => None,
    }
}

/// Text field with a drop-down of recent values next to it.
fn input_with_recent(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut String,
    recent: &[String],
    salt: (&str, &SourceId),
) {
    ui.label(label);
    ui.horizontal(|ui| {
        ui.add(egui::TextEdit::singleline(value).desired_width(ui.available_width() - 36.0));
        ui.add_enabled_ui(!recent.is_empty(), |ui| {
            egui::ComboBox::from_id_salt((salt.0, salt.1.as_str()))
                .selected_text("")
                .width(24.0)
                .show_ui(ui, |ui| {
                    for item in recent {
                        if ui.selectable_label(*item == *value, item.as_str()).clicked() {
                            value.clone_from(item);
                        }
                    }
                });
        });
    });
}

fn recent_of(recent: &HashMap<RecentKind, Vec<String>>, kind: RecentKind) -> &[String] {
    recent.get(&kind).map(Vec::as_slice).unwrap_or(&[])
}

fn state_line(ui: &mut egui::Ui, state: &ConnectionState) {
    match state {
        ConnectionState::Error(msg) => {
            ui.colored_label(ui.visuals().error_fg_color, format!("error: {msg}"));
        }
        other => {
            ui.weak(other.label());
        }
    }
}

fn form_ui(
    ui: &mut egui::Ui,
    source: &Source,
    form: &mut PaneForm,
    recent: &HashMap<RecentKind, Vec<String>>,
    ports: &[String],
) -> Option<PaneAction> {
    let id = source.id();
    let mut action = None;

    ui.heading(source.label());
    state_line(ui, source.state());
    ui.separator();

    let mut mode = source.mode();
    egui::ComboBox::from_id_salt(("mode", id.as_str()))
        .selected_text(mode.label())
        .show_ui(ui, |ui| {
            for m in TransportMode::SELECTABLE {
                ui.selectable_value(&mut mode, m, m.label());
            }
        });
    if mode != source.mode() {
        action = Some(PaneAction::SelectMode(mode));
    }
    ui.add_space(6.0);

    match mode {
        TransportMode::Unset => {
            ui.weak("Choose where samples come from.");
        }
        TransportMode::Socket => {
            input_with_recent(
                ui,
                "URL",
                &mut form.socket_url,
                recent_of(recent, RecentKind::SocketUrl),
                ("recent_ws", id),
            );
        }
        TransportMode::File => {
            input_with_recent(
                ui,
                "File",
                &mut form.file_path,
                recent_of(recent, RecentKind::FileName),
                ("recent_file", id),
            );
            if ui
                .button(format!("{} Browse…", egui_phosphor::regular::FOLDER_OPEN))
                .clicked()
            {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("JSON lines", &["jsonl", "json", "txt", "log"])
                    .pick_file()
                {
                    form.file_path = path.display().to_string();
                }
            }
            ui.horizontal(|ui| {
                ui.label("Skip header lines");
                ui.add(egui::DragValue::new(&mut form.skip_lines).range(0..=10_000));
            });
        }
        TransportMode::Device => {
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_salt(("ports", id.as_str()))
                    .selected_text(if ports.is_empty() { "No ports" } else { "Ports" })
                    .show_ui(ui, |ui| {
                        for port in ports {
                            if ui.selectable_label(*port == form.device_path, port.as_str()).clicked() {
                                form.device_path.clone_from(port);
                            }
                        }
                    });
                if ui
                    .small_button(egui_phosphor::regular::ARROW_CLOCKWISE)
                    .on_hover_text("Rescan ports")
                    .clicked()
                {
                    action = Some(PaneAction::RefreshPorts);
                }
            });
            input_with_recent(
                ui,
                "Device",
                &mut form.device_path,
                recent_of(recent, RecentKind::DevicePath),
                ("recent_dev", id),
            );
            ui.horizontal(|ui| {
                ui.label("Baud");
                ui.add(egui::DragValue::new(&mut form.baud_rate).range(300..=4_000_000));
            });
        }
        TransportMode::Broker => {
            input_with_recent(
                ui,
                "Host",
                &mut form.broker_host,
                recent_of(recent, RecentKind::BrokerHost),
                ("recent_host", id),
            );
            egui::Grid::new(("broker_grid", id.as_str()))
                .num_columns(2)
                .show(ui, |ui| {
                    ui.label("Port");
                    ui.text_edit_singleline(&mut form.broker_port);
                    ui.end_row();
                    ui.label("Path");
                    ui.text_edit_singleline(&mut form.broker_path);
                    ui.end_row();
                });
            input_with_recent(
                ui,
                "Topic",
                &mut form.broker_topic,
                recent_of(recent, RecentKind::BrokerTopic),
                ("recent_topic", id),
            );
            ui.checkbox(&mut form.broker_tls, "TLS (wss)");
            if form.broker_tls {
                egui::Grid::new(("broker_auth", id.as_str()))
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.label("Username");
                        ui.text_edit_singleline(&mut form.broker_user);
                        ui.end_row();
                        ui.label("Password");
                        ui.add(egui::TextEdit::singleline(&mut form.broker_password).password(true));
                        ui.end_row();
                    });
            }
        }
    }

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        if let Some(lines) = loading(source) {
            ui.add_enabled(false, egui::Button::new(format!("Loading… {lines} lines")));
            ui.spinner();
        } else if ui
            .add_enabled(mode != TransportMode::Unset, egui::Button::new("Connect"))
            .clicked()
        {
            action = Some(match form.request(mode) {
                Ok(request) => PaneAction::Connect(request),
                Err(err) => PaneAction::Invalid(err.to_string()),
            });
        }
        if source.state().is_active() && ui.button("Disconnect").clicked() {
            action = Some(PaneAction::Disconnect);
        }
    });
    action
}

impl MagApp {
    /// Draw the active pane. Returns at most one action per frame.
    pub(super) fn pane(&mut self, ui: &mut egui::Ui, id: &SourceId) -> Option<PaneAction> {
        let source = self.workspace.source(id)?;
        let mut action = None;

        if !source.display.collapsed {
            let available = ui.available_width();
            let width = clamp_side_width(source.display.left_width, available);
            let max = (available - MIN_CHART_AREA).max(MIN_SIDE_WIDTH);
            let form = self
                .forms
                .entry(id.clone())
                .or_insert_with(|| PaneForm::new(&self.config.broker_defaults));
            let side = egui::SidePanel::left(egui::Id::new(("pane_side", id.as_str())))
                .resizable(true)
                .default_width(width)
                .width_range(MIN_SIDE_WIDTH..=max)
                .show_inside(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .show(ui, |ui| form_ui(ui, source, form, &self.recent, &self.ports))
                        .inner
                });
            action = side.inner;

            // Commit the splitter position once the drag is over.
            let shown = side.response.rect.width();
            let dragging = ui.input(|i| i.pointer.any_down());
            let committed = source.display.left_width.unwrap_or(width);
            if action.is_none() && !dragging && (committed - shown).abs() > 0.5 {
                action = Some(PaneAction::Resized(shown));
            }
        }

        egui::TopBottomPanel::bottom(egui::Id::new(("pane_history", id.as_str())))
            .resizable(true)
            .default_height(240.0)
            .min_height(120.0)
            .show_inside(ui, |ui| {
                if history_ui::show(ui, source) {
                    action = Some(PaneAction::Export);
                }
            });

        egui::CentralPanel::default().show_inside(ui, |ui| {
            charts::show(ui, source);
        });
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> PaneForm {
        PaneForm::new(&BrokerParams::default())
    }

    #[test]
    fn side_width_is_clamped() {
        assert_eq!(clamp_side_width(None, 1400.0), DEFAULT_SIDE_WIDTH);
        assert_eq!(clamp_side_width(Some(100.0), 1400.0), MIN_SIDE_WIDTH);
        assert_eq!(clamp_side_width(Some(1200.0), 1400.0), 1080.0);
        // tiny windows still get the minimum
        assert_eq!(clamp_side_width(Some(300.0), 400.0), MIN_SIDE_WIDTH);
    }

    #[test]
    fn socket_request_needs_ws_url() {
        let mut f = form();
        f.socket_url = "http://example.com".into();
        assert!(f.request(TransportMode::Socket).is_err());
        f.socket_url = " ws://localhost:8080/stream ".into();
        assert_eq!(
            f.request(TransportMode::Socket).unwrap(),
            ConnectRequest::Socket {
                url: "ws://localhost:8080/stream".into()
            }
        );
    }

    #[test]
    fn file_and_device_need_a_path() {
        let mut f = form();
        assert!(f.request(TransportMode::File).is_err());
        assert!(f.request(TransportMode::Device).is_err());
        f.file_path = "/tmp/run.jsonl".into();
        f.skip_lines = 2;
        assert_eq!(
            f.request(TransportMode::File).unwrap(),
            ConnectRequest::File {
                path: PathBuf::from("/tmp/run.jsonl"),
                skip_lines: 2
            }
        );
        f.device_path = "/dev/ttyUSB0".into();
        assert!(matches!(
            f.request(TransportMode::Device),
            Ok(ConnectRequest::Device { baud_rate: 115_200, .. })
        ));
        assert!(f.request(TransportMode::Unset).is_err());
    }

    #[test]
    fn broker_request_uses_defaults() {
        let mut f = form();
        assert!(f.request(TransportMode::Broker).is_err());
        f.broker_host = "broker.local".into();
        f.broker_topic = "  ".into();
        let Ok(ConnectRequest::Broker(params)) = f.request(TransportMode::Broker) else {
            panic!("expected broker request");
        };
        assert_eq!(params.topic, "mag-usb");
        assert_eq!(params.url(), "ws://broker.local:8081/mqtt");
        f.broker_port = "70000".into();
        assert!(f.request(TransportMode::Broker).is_err());
    }
}
