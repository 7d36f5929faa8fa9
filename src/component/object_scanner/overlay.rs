//! 影格疊加：偵測框與字幕
//!
//! 文字使用 8x8 點陣字型，依字幕大小整數倍放大。
//! 座標沿用「左下基準線」慣例：回傳的 y 是文字底部。

use super::detection::Detection;
use crate::config::{OverlayAnchor, OverlaySettings};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};

pub const OVERLAY_MARGIN: i64 = 10;
const GLYPH_SIZE: u32 = 8;
const BOX_THICKNESS: i64 = 2;
const LABEL_SCALE: f32 = 0.5;

const BOX_PALETTE: [[u8; 3]; 6] = [
    [56, 56, 255],
    [255, 157, 151],
    [255, 112, 31],
    [72, 249, 10],
    [146, 204, 23],
    [0, 212, 187],
];

/// 字幕大小換算為點陣放大倍數（0.5 → 2 倍）
#[must_use]
pub fn glyph_scale(font_scale: f32) -> u32 {
    ((font_scale * 4.0).round() as u32).max(1)
}

/// 文字寬高（像素）
#[must_use]
pub fn text_size(text: &str, font_scale: f32) -> (u32, u32) {
    let cell = GLYPH_SIZE * glyph_scale(font_scale);
    (text.chars().count() as u32 * cell, cell)
}

/// 依錨點計算文字左下角位置，確保字幕不超出畫面邊緣
#[must_use]
pub fn overlay_position(
    anchor: OverlayAnchor,
    width: u32,
    height: u32,
    text_width: u32,
    text_height: u32,
) -> (i64, i64) {
    let (w, h) = (i64::from(width), i64::from(height));
    let (tw, th) = (i64::from(text_width), i64::from(text_height));
    let m = OVERLAY_MARGIN;

    match anchor {
        OverlayAnchor::TopLeft => (m, m + th),
        OverlayAnchor::TopRight => (w - tw - m, m + th),
        OverlayAnchor::BottomLeft => (m, h - m),
        OverlayAnchor::BottomRight => (w - tw - m, h - m),
    }
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// 先裁到畫面範圍再填色，偵測器回傳的座標可能遠超出畫面
fn fill_rect(image: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    let x_end = x.saturating_add(w).min(i64::from(image.width()));
    let y_end = y.saturating_add(h).min(i64::from(image.height()));
    for py in y.max(0)..y_end {
        for px in x.max(0)..x_end {
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

fn draw_hollow_rect(image: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
    let (w, h) = (x2.saturating_sub(x1), y2.saturating_sub(y1));
    fill_rect(image, x1, y1, w, BOX_THICKNESS, color);
    fill_rect(image, x1, y2.saturating_sub(BOX_THICKNESS), w, BOX_THICKNESS, color);
    fill_rect(image, x1, y1, BOX_THICKNESS, h, color);
    fill_rect(image, x2.saturating_sub(BOX_THICKNESS), y1, BOX_THICKNESS, h, color);
}

/// 以 `origin`（左下基準）繪製文字，超出畫面的部分直接裁掉
pub fn draw_text(image: &mut RgbImage, text: &str, origin: (i64, i64), font_scale: f32, color: [u8; 3]) {
    let scale = i64::from(glyph_scale(font_scale));
    let cell = i64::from(GLYPH_SIZE) * scale;
    let (x0, baseline) = origin;
    let top = baseline.saturating_sub(cell);
    let color = Rgb(color);

    for (i, ch) in text.chars().enumerate() {
        let glyph_x = x0.saturating_add(i as i64 * cell);
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits >> col & 1 == 1 {
                    fill_rect(
                        image,
                        glyph_x.saturating_add(i64::from(col) * scale),
                        top.saturating_add(row as i64 * scale),
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
    }
}

/// 依設定的錨點、大小與顏色繪製字幕
pub fn draw_caption(image: &mut RgbImage, text: &str, overlay: &OverlaySettings) {
    if text.is_empty() {
        return;
    }
    let (tw, th) = text_size(text, overlay.scale);
    let origin = overlay_position(overlay.anchor, image.width(), image.height(), tw, th);
    draw_text(image, text, origin, overlay.scale, overlay.color);
}

/// 繪製偵測框與「類別 信心」標籤
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let color = BOX_PALETTE[detection.class_id as usize % BOX_PALETTE.len()];
        let bbox = detection.bbox;
        let (x1, y1) = (bbox.x1.round() as i64, bbox.y1.round() as i64);
        let (x2, y2) = (bbox.x2.round() as i64, bbox.y2.round() as i64);
        draw_hollow_rect(image, x1, y1, x2, y2, Rgb(color));

        let label = format!("{} {:.2}", detection.label, detection.confidence);
        let (tw, th) = text_size(&label, LABEL_SCALE);
        let (tw, th) = (i64::from(tw), i64::from(th));
        // 標籤放在框上方，貼頂時改放框內
        let baseline = if y1.saturating_sub(th + 2) >= 0 {
            y1 - 2
        } else {
            y1.saturating_add(th + 2)
        };
        fill_rect(image, x1, baseline.saturating_sub(th + 1), tw + 2, th + 2, Rgb(color));
        draw_text(image, &label, (x1.saturating_add(1), baseline), LABEL_SCALE, [255, 255, 255]);
    }
}
