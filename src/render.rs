//! Chart geometry for one source: four independently scaled channel charts sharing one
//! time axis.
//!
//! Everything here is pure and works in physical pixels, so the UI layer only has to
//! convert to points and paint. A frame is recomputed from the plot window on every draw.

use crate::data::sample::{Channel, Sample};

/// Inset on each side of a chart / axis surface, in physical pixels.
pub const PLOT_MARGIN: f32 = 4.0;
/// Candidate tick steps for the time axis, in seconds.
pub const NICE_STEPS_SECS: [u32; 13] = [1, 2, 5, 10, 15, 30, 60, 120, 300, 600, 900, 1800, 3600];
/// Upper bound on the number of tick intervals across the window.
pub const TARGET_TICKS: f64 = 8.0;
/// Minimum chart surface, physical pixels.
pub const MIN_CHART_PX: [f32; 2] = [100.0, 80.0];
/// Minimum time-axis surface, physical pixels.
pub const MIN_AXIS_PX: [f32; 2] = [100.0, 18.0];
/// Height of a tick mark.
pub const TICK_MARK_PX: f32 = 12.0;

/// Pick the smallest ladder step such that `span / step <= TARGET_TICKS`.
///
/// Spans beyond the ladder use its largest step.
pub fn tick_step(span_secs: f64) -> u32 {
    NICE_STEPS_SECS
        .iter()
        .copied()
        .find(|s| span_secs / f64::from(*s) <= TARGET_TICKS)
        .unwrap_or(NICE_STEPS_SECS[NICE_STEPS_SECS.len() - 1])
}

/// A drawing surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
}

impl Surface {
    /// Size in physical pixels from an on-screen logical size and the display density,
    /// never smaller than `min`.
    pub fn from_logical(size: [f32; 2], pixels_per_point: f32, min: [f32; 2]) -> Self {
        let ppp = if pixels_per_point > 0.0 { pixels_per_point } else { 1.0 };
        Self {
            width: (size[0] * ppp).floor().max(min[0]),
            height: (size[1] * ppp).floor().max(min[1]),
        }
    }

    fn map_x(&self, t_ms: i64, t_min: i64, t_span: f64) -> f32 {
        let frac = (t_ms - t_min) as f64 / t_span;
        (frac * f64::from(self.width - 2.0 * PLOT_MARGIN)) as f32 + PLOT_MARGIN
    }

    fn map_y(&self, v: f64, v_min: f64, v_span: f64) -> f32 {
        let frac = (v - v_min) / v_span;
        self.height - (frac * f64::from(self.height - 2.0 * PLOT_MARGIN)) as f32 - PLOT_MARGIN
    }
}

/// Geometry of one channel chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelChart {
    pub channel: Channel,
    /// `(min, max)` of the values present in the window; `None` when the channel has no
    /// value at all (the chart stays blank).
    pub range: Option<(f64, f64)>,
    /// Connected runs of points. A sample missing the channel ends the current run.
    pub segments: Vec<Vec<[f32; 2]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub x: f32,
    /// Whole seconds since the window start.
    pub seconds: u64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub step_secs: u32,
    /// Horizontal baseline from `x0` to `x1`.
    pub x0: f32,
    pub x1: f32,
    pub ticks: Vec<Tick>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Earliest instant in the window, epoch milliseconds.
    pub t_min: i64,
    pub t_max: i64,
    /// `max(1, t_max - t_min)` in milliseconds.
    pub t_span: i64,
    pub charts: Vec<ChannelChart>,
    pub axis: TimeAxis,
}

/// Result of one draw pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedFrame {
    /// Empty window: every surface is cleared, nothing else is drawn.
    Cleared,
    Drawn(Frame),
}

/// Lay out one frame from a chronological plot window.
pub fn render_frame(window: &[&Sample], chart: Surface, axis: Surface) -> RenderedFrame {
    let Some(first) = window.first() else {
        return RenderedFrame::Cleared;
    };
    let mut t_min = first.epoch_millis();
    let mut t_max = t_min;
    for s in window {
        let t = s.epoch_millis();
        t_min = t_min.min(t);
        t_max = t_max.max(t);
    }
    let t_span = (t_max - t_min).max(1);

    let charts = Channel::ALL
        .iter()
        .map(|ch| channel_chart(*ch, window, chart, t_min, t_span as f64))
        .collect();

    RenderedFrame::Drawn(Frame {
        t_min,
        t_max,
        t_span,
        charts,
        axis: time_axis(axis, t_span),
    })
}

fn channel_chart(
    channel: Channel,
    window: &[&Sample],
    surface: Surface,
    t_min: i64,
    t_span: f64,
) -> ChannelChart {
    let range = window
        .iter()
        .filter_map(|s| s.channel(channel).filter(|v| v.is_finite()))
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });
    let Some((v_min, v_max)) = range else {
        return ChannelChart { channel, range: None, segments: Vec::new() };
    };
    let v_span = if v_max - v_min == 0.0 { 1.0 } else { v_max - v_min };

    let mut segments = Vec::new();
    let mut run: Vec<[f32; 2]> = Vec::new();
    for s in window {
        match s.channel(channel).filter(|v| v.is_finite()) {
            Some(v) => run.push([
                surface.map_x(s.epoch_millis(), t_min, t_span),
                surface.map_y(v, v_min, v_span),
            ]),
            None => {
                if !run.is_empty() {
                    segments.push(std::mem::take(&mut run));
                }
            }
        }
    }
    if !run.is_empty() {
        segments.push(run);
    }
    ChannelChart { channel, range, segments }
}

fn time_axis(surface: Surface, t_span_ms: i64) -> TimeAxis {
    let span_secs = t_span_ms as f64 / 1000.0;
    let step = tick_step(span_secs);
    let width = f64::from(surface.width - 2.0 * PLOT_MARGIN);
    let ticks = (0..)
        .map(|i: u64| i * u64::from(step))
        .take_while(|s| (*s as f64) <= span_secs)
        .map(|s| Tick {
            x: ((s as f64 * 1000.0 / t_span_ms as f64) * width) as f32 + PLOT_MARGIN,
            seconds: s,
            label: format!("{s}s"),
        })
        .collect();
    TimeAxis {
        step_secs: step,
        x0: PLOT_MARGIN,
        x1: surface.width - PLOT_MARGIN,
        ticks,
    }
}
