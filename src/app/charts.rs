//! Paints the four channel charts and the shared time axis of one source.

use eframe::egui::{self, Align2, FontId, Pos2, Rect, Sense, Shape, Stroke};

use crate::color_scheme::{channel_color, AXIS_COLOR};
use crate::data::sample::Channel;
use crate::render::{
    render_frame, ChannelChart, RenderedFrame, Surface, TimeAxis, MIN_AXIS_PX, MIN_CHART_PX,
    TICK_MARK_PX,
};
use crate::source::Source;

const SERIES_STROKE_PX: f32 = 2.0;
const AXIS_STROKE_PX: f32 = 1.0;
const AXIS_HEIGHT: f32 = 18.0;

/// Maps physical-pixel coordinates of a [`Surface`] into a screen rect.
struct Placement {
    rect: Rect,
    sx: f32,
    sy: f32,
}

impl Placement {
    fn new(rect: Rect, surface: Surface) -> Self {
        Self {
            rect,
            sx: rect.width() / surface.width,
            sy: rect.height() / surface.height,
        }
    }

    fn pos(&self, p: [f32; 2]) -> Pos2 {
        Pos2::new(self.rect.min.x + p[0] * self.sx, self.rect.min.y + p[1] * self.sy)
    }
}

pub(super) fn show(ui: &mut egui::Ui, source: &Source) {
    let ppp = ui.ctx().pixels_per_point();
    let avail = ui.available_size();
    let caption_h = ui.text_style_height(&egui::TextStyle::Small) + ui.spacing().item_spacing.y;
    let axis_h = AXIS_HEIGHT + caption_h;
    let chart_h = ((avail.y - axis_h) / 4.0 - caption_h - ui.spacing().item_spacing.y)
        .max(MIN_CHART_PX[1] / ppp);

    // Surfaces follow the on-screen size every frame.
    let chart_surface = Surface::from_logical([avail.x, chart_h], ppp, MIN_CHART_PX);
    let axis_surface = Surface::from_logical([avail.x, AXIS_HEIGHT], ppp, MIN_AXIS_PX);

    let window = source.store().plot_window();
    let frame = render_frame(&window, chart_surface, axis_surface);
    let series_width = SERIES_STROKE_PX / ppp;

    for channel in Channel::ALL {
        let chart = match &frame {
            RenderedFrame::Drawn(f) => f.charts.iter().find(|c| c.channel == channel),
            RenderedFrame::Cleared => None,
        };
        caption(ui, channel, chart);
        let (rect, _) = ui.allocate_exact_size(egui::vec2(avail.x, chart_h), Sense::hover());
        let painter = ui.painter_at(rect);
        painter.rect_stroke(
            rect,
            2.0,
            Stroke::new(AXIS_STROKE_PX / ppp, ui.visuals().weak_text_color()),
            egui::StrokeKind::Inside,
        );
        if let Some(chart) = chart {
            let place = Placement::new(rect, chart_surface);
            let stroke = Stroke::new(series_width, channel_color(channel));
            for segment in &chart.segments {
                let points: Vec<Pos2> = segment.iter().map(|p| place.pos(*p)).collect();
                match points.as_slice() {
                    [only] => {
                        painter.circle_filled(*only, stroke.width, stroke.color);
                    }
                    _ => {
                        painter.add(Shape::line(points, stroke));
                    }
                }
            }
        }
    }

    let (rect, _) = ui.allocate_exact_size(egui::vec2(avail.x, axis_h), Sense::hover());
    if let RenderedFrame::Drawn(f) = &frame {
        let axis_rect = Rect::from_min_size(rect.min, egui::vec2(rect.width(), AXIS_HEIGHT));
        paint_axis(
            &ui.painter_at(rect),
            &Placement::new(axis_rect, axis_surface),
            &f.axis,
            ppp,
        );
    }
}

fn caption(ui: &mut egui::Ui, channel: Channel, chart: Option<&ChannelChart>) {
    ui.horizontal(|ui| {
        ui.colored_label(channel_color(channel), channel.label());
        if let Some((lo, hi)) = chart.and_then(|c| c.range) {
            ui.small(format!("{lo:.3} … {hi:.3}"));
        }
    });
}

fn paint_axis(painter: &egui::Painter, place: &Placement, axis: &TimeAxis, ppp: f32) {
    let stroke = Stroke::new(AXIS_STROKE_PX / ppp, AXIS_COLOR);
    let top = place.rect.min.y;
    painter.line_segment(
        [place.pos([axis.x0, 0.0]), place.pos([axis.x1, 0.0])],
        stroke,
    );
    let tick_h = TICK_MARK_PX / ppp;
    for tick in &axis.ticks {
        let x = place.pos([tick.x, 0.0]).x;
        painter.line_segment([Pos2::new(x, top), Pos2::new(x, top + tick_h)], stroke);
        painter.text(
            Pos2::new(x, top + tick_h + 1.0),
            Align2::CENTER_TOP,
            &tick.label,
            FontId::proportional(10.0),
            AXIS_COLOR,
        );
    }
}
