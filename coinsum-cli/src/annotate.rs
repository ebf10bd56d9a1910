//! Presentation: draw detections and the counted total onto a frame copy.
//!
//! Value computation never depends on anything here; annotation is a side
//! product for humans. The total is rendered as seven-segment digits so no
//! font asset is needed.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use coinsum_core::{CoinReading, CountOutput, Region, sample_boundary};

const REGION_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const ELLIPSE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const TOTAL_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Canvas position where the total is rendered.
const TOTAL_ANCHOR: (i32, i32) = (150, 200);
/// Seven-segment digit cell geometry, in pixels.
const DIGIT_WIDTH: i32 = 36;
const DIGIT_HEIGHT: i32 = 72;
const DIGIT_STROKE: i32 = 7;
const DIGIT_GAP: i32 = 14;

/// Render bounding boxes, coin boundaries, and the total onto a copy.
pub fn annotate(image: &DynamicImage, output: &CountOutput) -> RgbaImage {
    let mut canvas = image.to_rgba8();

    for region in &output.regions {
        draw_region(&mut canvas, region);
    }
    for reading in &output.readings {
        draw_coin_boundary(&mut canvas, reading);
    }
    draw_total(&mut canvas, output.total, TOTAL_ANCHOR);

    canvas
}

fn draw_region(canvas: &mut RgbaImage, region: &Region) {
    let (img_w, img_h) = canvas.dimensions();
    let Some((x, y, w, h)) = region.pixel_rect(img_w, img_h) else {
        return;
    };
    let rect = Rect::at(x as i32, y as i32).of_size(w.max(1), h.max(1));
    draw_hollow_rect_mut(canvas, rect, REGION_COLOR);
}

/// Polyline through sampled boundary points, shifted into frame coordinates.
fn draw_coin_boundary(canvas: &mut RgbaImage, reading: &CoinReading) {
    let (img_w, img_h) = canvas.dimensions();
    let Some((ox, oy, _, _)) = reading.region.pixel_rect(img_w, img_h) else {
        return;
    };

    let points = sample_boundary(&reading.ellipse, 128);
    for (i, &[x0, y0]) in points.iter().enumerate() {
        let [x1, y1] = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            canvas,
            (ox as f32 + x0 as f32, oy as f32 + y0 as f32),
            (ox as f32 + x1 as f32, oy as f32 + y1 as f32),
            ELLIPSE_COLOR,
        );
    }
}

/// Seven-segment layout: bit order A (top), B (top-right), C (bottom-right),
/// D (bottom), E (bottom-left), F (top-left), G (middle).
const SEGMENTS: [u8; 10] = [
    0b0111111, // 0
    0b0000110, // 1
    0b1011011, // 2
    0b1001111, // 3
    0b1100110, // 4
    0b1101101, // 5
    0b1111101, // 6
    0b0000111, // 7
    0b1111111, // 8
    0b1101111, // 9
];

/// Segment bitmask for one decimal digit.
pub fn digit_segments(digit: u8) -> u8 {
    SEGMENTS[(digit % 10) as usize]
}

/// Render the total left-to-right from the anchor.
fn draw_total(canvas: &mut RgbaImage, total: i64, anchor: (i32, i32)) {
    let text = total.to_string();
    let mut cursor_x = anchor.0;
    for ch in text.chars() {
        match ch {
            '-' => {
                fill(
                    canvas,
                    cursor_x,
                    anchor.1 + DIGIT_HEIGHT / 2 - DIGIT_STROKE / 2,
                    DIGIT_WIDTH,
                    DIGIT_STROKE,
                );
            }
            _ => {
                let digit = ch.to_digit(10).unwrap_or(0) as u8;
                draw_digit(canvas, digit, cursor_x, anchor.1);
            }
        }
        cursor_x += DIGIT_WIDTH + DIGIT_GAP;
    }
}

fn draw_digit(canvas: &mut RgbaImage, digit: u8, x: i32, y: i32) {
    let mask = digit_segments(digit);
    let (w, h, t) = (DIGIT_WIDTH, DIGIT_HEIGHT, DIGIT_STROKE);
    let half = h / 2;

    // (bit, x, y, width, height) for each segment bar.
    let bars = [
        (0, x, y, w, t),                          // A
        (1, x + w - t, y, t, half),               // B
        (2, x + w - t, y + half, t, half),        // C
        (3, x, y + h - t, w, t),                  // D
        (4, x, y + half, t, half),                // E
        (5, x, y, t, half),                       // F
        (6, x, y + half - t / 2, w, t),           // G
    ];
    for (bit, bx, by, bw, bh) in bars {
        if (mask >> bit) & 1 != 0 {
            fill(canvas, bx, by, bw, bh);
        }
    }
}

fn fill(canvas: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32) {
    if w <= 0 || h <= 0 {
        return;
    }
    let rect = Rect::at(x, y).of_size(w as u32, h as u32);
    draw_filled_rect_mut(canvas, rect, TOTAL_COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinsum_core::CoinEllipse;
    use image::DynamicImage;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])))
    }

    fn count_pixels(canvas: &RgbaImage, color: Rgba<u8>) -> usize {
        canvas.pixels().filter(|&&p| p == color).count()
    }

    #[test]
    fn digit_masks_have_the_expected_segment_counts() {
        assert_eq!(digit_segments(8).count_ones(), 7);
        assert_eq!(digit_segments(1).count_ones(), 2);
        assert_eq!(digit_segments(0).count_ones(), 6);
        assert_eq!(digit_segments(7).count_ones(), 3);
    }

    #[test]
    fn annotation_draws_region_boxes() {
        let output = CountOutput {
            total: 0,
            readings: vec![],
            regions: vec![Region { x: 10.0, y: 10.0, width: 50.0, height: 40.0 }],
        };
        let canvas = annotate(&blank(640, 480), &output);
        assert!(count_pixels(&canvas, REGION_COLOR) > 0);
        assert_eq!(canvas.get_pixel(10, 10), &REGION_COLOR);
    }

    #[test]
    fn annotation_draws_ellipse_outline_in_frame_coordinates() {
        let reading = CoinReading {
            region: Region { x: 100.0, y: 100.0, width: 120.0, height: 120.0 },
            ellipse: CoinEllipse { cx: 60.0, cy: 60.0, major: 80.0, minor: 80.0, angle_deg: 0.0 },
            value: 1,
        };
        let output = CountOutput { total: 1, readings: vec![reading], regions: vec![] };
        let canvas = annotate(&blank(640, 480), &output);
        // The circle's rightmost point sits at (100 + 60 + 40, 100 + 60).
        assert_eq!(canvas.get_pixel(200, 160), &ELLIPSE_COLOR);
    }

    #[test]
    fn total_renders_near_the_fixed_anchor() {
        let output = CountOutput { total: 18, readings: vec![], regions: vec![] };
        let canvas = annotate(&blank(640, 480), &output);
        assert!(count_pixels(&canvas, TOTAL_COLOR) > 100);
        // "1" uses only the right-hand segments of the first digit cell.
        let right_bar_x = (TOTAL_ANCHOR.0 + DIGIT_WIDTH - 2) as u32;
        assert_eq!(canvas.get_pixel(right_bar_x, TOTAL_ANCHOR.1 as u32 + 10), &TOTAL_COLOR);
    }

    #[test]
    fn negative_totals_render_a_minus_sign() {
        let output = CountOutput { total: -3, readings: vec![], regions: vec![] };
        let canvas = annotate(&blank(640, 480), &output);
        let minus_y = (TOTAL_ANCHOR.1 + DIGIT_HEIGHT / 2) as u32;
        assert_eq!(canvas.get_pixel(TOTAL_ANCHOR.0 as u32 + 5, minus_y), &TOTAL_COLOR);
    }
}
