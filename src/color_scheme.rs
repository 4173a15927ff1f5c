//! Theme and channel colors.

use eframe::egui::{Color32, Context, Visuals};

use crate::data::sample::Channel;

/// Global display theme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn all() -> &'static [Theme] {
        &[Theme::Light, Theme::Dark]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Theme matching the platform preference, if eframe reported one.
    pub fn from_system(dark: Option<bool>) -> Self {
        match dark {
            Some(false) => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn visuals(&self) -> Visuals {
        match self {
            Theme::Light => Visuals::light(),
            Theme::Dark => Visuals::dark(),
        }
    }

    pub fn apply(&self, ctx: &Context) {
        ctx.set_visuals(self.visuals());
    }
}

/// Axis line, tick and label color.
pub const AXIS_COLOR: Color32 = Color32::from_rgb(0x9c, 0xa3, 0xaf);

/// Stroke color of one channel chart.
pub const fn channel_color(channel: Channel) -> Color32 {
    match channel {
        Channel::X => Color32::from_rgb(0xef, 0x44, 0x44),
        Channel::Y => Color32::from_rgb(0x22, 0xc5, 0x5e),
        Channel::Z => Color32::from_rgb(0x3b, 0x82, 0xf6),
        Channel::Temperature => Color32::from_rgb(0xf5, 0x9e, 0x0b),
    }
}
