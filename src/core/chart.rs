//! Renders a session timeline as a PNG line chart.

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_polygon_mut, draw_text_mut, text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::path::Path;

use crate::core::session::Timeline;
use crate::error::Result;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 600;
const MARGIN: f32 = 60.0;
const Y_MAX: f64 = 100.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

const TITLE: &str = "Emotion Timeline During Practice";
const X_LABEL: &str = "Time (frames)";
const Y_LABEL: &str = "Score (%)";

static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

#[derive(Clone, Copy)]
enum Marker {
    Circle,
    Square,
    Triangle,
    Diamond,
}

struct Series<'a> {
    label: &'static str,
    values: &'a [f64],
    color: Rgb<u8>,
    marker: Marker,
    dashed: bool,
}

/// Draw happy, neutral, fear and confidence over the timeline and save to
/// `path` (format chosen by extension).
pub fn render_timeline(timeline: &Timeline, path: &Path) -> Result<()> {
    let image = draw_timeline(timeline);
    image.save(path)?;
    log::debug!("Saved timeline chart to {}", path.display());
    Ok(())
}

/// Draw the chart in memory.
pub fn draw_timeline(timeline: &Timeline) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let font = Font::try_from_bytes(FONT_DATA);
    if font.is_none() {
        log::warn!("Chart font failed to load, rendering without text");
    }
    draw_frame(&mut img);

    let series = [
        Series {
            label: "Happy",
            values: &timeline.happy,
            color: Rgb([0x4C, 0xAF, 0x50]),
            marker: Marker::Circle,
            dashed: false,
        },
        Series {
            label: "Neutral",
            values: &timeline.neutral,
            color: Rgb([0x21, 0x96, 0xF3]),
            marker: Marker::Square,
            dashed: false,
        },
        Series {
            label: "Fear",
            values: &timeline.fear,
            color: Rgb([0xFF, 0x98, 0x00]),
            marker: Marker::Triangle,
            dashed: false,
        },
        Series {
            label: "Confidence",
            values: &timeline.confidence,
            color: Rgb([0x9C, 0x27, 0xB0]),
            marker: Marker::Diamond,
            dashed: true,
        },
    ];

    let xs = x_positions(&timeline.timestamps);
    for s in &series {
        let points: Vec<(f32, f32)> = xs
            .iter()
            .zip(s.values)
            .map(|(&x, &v)| (x, y_position(v)))
            .collect();
        for pair in points.windows(2) {
            draw_thick_line(&mut img, pair[0], pair[1], s.color, s.dashed);
        }
        for &p in &points {
            draw_marker(&mut img, p, s.marker, s.color);
        }
    }

    draw_legend(&mut img, &series, font.as_ref());
    if let Some(font) = &font {
        draw_labels(&mut img, font);
    }
    img
}

fn plot_width() -> f32 {
    WIDTH as f32 - 2.0 * MARGIN
}

fn plot_height() -> f32 {
    HEIGHT as f32 - 2.0 * MARGIN
}

fn x_positions(timestamps: &[f64]) -> Vec<f32> {
    let (min, max) = timestamps
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
    let span = max - min;

    timestamps
        .iter()
        .map(|&t| {
            let frac = if span > 0.0 { (t - min) / span } else { 0.5 };
            MARGIN + frac as f32 * plot_width()
        })
        .collect()
}

fn y_position(value: f64) -> f32 {
    let frac = (value / Y_MAX).clamp(0.0, 1.0) as f32;
    HEIGHT as f32 - MARGIN - frac * plot_height()
}

fn draw_frame(img: &mut RgbImage) {
    for step in 0..=10 {
        let y = y_position(f64::from(step) * 10.0);
        draw_line_segment_mut(img, (MARGIN, y), (MARGIN + plot_width(), y), GRID);
    }
    let left = MARGIN as i32;
    let top = MARGIN as i32;
    draw_hollow_rect_mut(
        img,
        Rect::at(left, top).of_size(plot_width() as u32, plot_height() as u32),
        AXIS,
    );
}

fn draw_thick_line(
    img: &mut RgbImage,
    from: (f32, f32),
    to: (f32, f32),
    color: Rgb<u8>,
    dashed: bool,
) {
    let segments: Vec<Segment> = if dashed {
        dash(from, to, 10.0, 6.0)
    } else {
        vec![(from, to)]
    };

    for (a, b) in segments {
        for offset in [-1.0f32, 0.0, 1.0] {
            draw_line_segment_mut(img, (a.0, a.1 + offset), (b.0, b.1 + offset), color);
        }
    }
}

type Segment = ((f32, f32), (f32, f32));

fn dash(from: (f32, f32), to: (f32, f32), on: f32, off: f32) -> Vec<Segment> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return Vec::new();
    }
    let (ux, uy) = (dx / length, dy / length);

    let mut out = Vec::new();
    let mut start = 0.0;
    while start < length {
        let end = (start + on).min(length);
        out.push((
            (from.0 + ux * start, from.1 + uy * start),
            (from.0 + ux * end, from.1 + uy * end),
        ));
        start = end + off;
    }
    out
}

fn draw_marker(img: &mut RgbImage, (x, y): (f32, f32), marker: Marker, color: Rgb<u8>) {
    let (cx, cy) = (x.round() as i32, y.round() as i32);
    let r = 5;
    match marker {
        Marker::Circle => draw_filled_circle_mut(img, (cx, cy), r, color),
        Marker::Square => {
            let side = 2 * r as u32;
            draw_filled_rect_mut(img, Rect::at(cx - r, cy - r).of_size(side, side), color)
        }
        Marker::Triangle => draw_polygon_mut(
            img,
            &[
                Point::new(cx, cy - r - 1),
                Point::new(cx + r + 1, cy + r),
                Point::new(cx - r - 1, cy + r),
            ],
            color,
        ),
        Marker::Diamond => draw_polygon_mut(
            img,
            &[
                Point::new(cx, cy - r - 1),
                Point::new(cx + r + 1, cy),
                Point::new(cx, cy + r + 1),
                Point::new(cx - r - 1, cy),
            ],
            color,
        ),
    }
}

fn draw_legend(img: &mut RgbImage, series: &[Series<'_>], font: Option<&Font<'_>>) {
    let x = WIDTH as f32 - MARGIN - 160.0;
    let scale = Scale::uniform(15.0);
    for (i, s) in series.iter().enumerate() {
        let y = MARGIN + 20.0 + i as f32 * 22.0;
        draw_thick_line(img, (x, y), (x + 40.0, y), s.color, s.dashed);
        draw_marker(img, (x + 20.0, y), s.marker, s.color);
        if let Some(font) = font {
            let (_, h) = text_size(scale, font, s.label);
            draw_text_mut(img, AXIS, (x + 50.0) as i32, y as i32 - h / 2, scale, font, s.label);
        }
    }
}

/// Title, axis labels and y ticks.
fn draw_labels(img: &mut RgbImage, font: &Font<'_>) {
    let title = Scale::uniform(22.0);
    let label = Scale::uniform(16.0);
    let tick = Scale::uniform(13.0);

    let (w, _) = text_size(title, font, TITLE);
    draw_text_mut(img, AXIS, (WIDTH as i32 - w) / 2, 18, title, font, TITLE);

    let (w, _) = text_size(label, font, X_LABEL);
    let bottom = (HEIGHT as f32 - MARGIN) as i32;
    draw_text_mut(img, AXIS, (WIDTH as i32 - w) / 2, bottom + 28, label, font, X_LABEL);
    draw_text_mut(img, AXIS, 8, MARGIN as i32 - 24, label, font, Y_LABEL);

    for step in (0..=100).step_by(20) {
        let text = step.to_string();
        let (w, h) = text_size(tick, font, &text);
        let y = y_position(f64::from(step)) as i32 - h / 2;
        draw_text_mut(img, AXIS, MARGIN as i32 - 8 - w, y, tick, font, &text);
    }
}
