// SPDX-License-Identifier: GPL-3.0-only

//! CPU implementations of the colour effects (reference path and fallback)
//!
//! The math mirrors `shaders/filter.wgsl` so switching backends does not
//! change the look of a recording.

use super::FilterType;

/// Apply `filter` in place to tightly or loosely packed RGBA rows
///
/// `stride` is the byte length of one row and must be at least `width * 4`.
/// Alpha is preserved.
pub fn apply_filter_rgba(data: &mut [u8], width: u32, height: u32, stride: u32, filter: FilterType) {
    if filter.is_identity() || width == 0 || height == 0 {
        return;
    }

    let width = width as usize;
    let height = height as usize;
    let stride = (stride as usize).max(width * 4);

    for (y, row) in data.chunks_mut(stride).take(height).enumerate() {
        let v = (y as f32 + 0.5) / height as f32;
        for (x, px) in row.chunks_exact_mut(4).take(width).enumerate() {
            let u = (x as f32 + 0.5) / width as f32;
            let rgb = [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ];
            let [r, g, b] = filter_pixel(rgb, filter, u, v);
            px[0] = to_byte(r);
            px[1] = to_byte(g);
            px[2] = to_byte(b);
        }
    }
}

#[inline]
fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn luminance([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[inline]
fn saturate(rgb: [f32; 3], amount: f32) -> [f32; 3] {
    let l = luminance(rgb);
    rgb.map(|c| (l + (c - l) * amount).clamp(0.0, 1.0))
}

/// One pixel through `filter`; `u`/`v` are normalised texture coordinates
fn filter_pixel(rgb: [f32; 3], filter: FilterType, u: f32, v: f32) -> [f32; 3] {
    match filter {
        FilterType::Standard => rgb,

        FilterType::Mono => [luminance(rgb); 3],

        FilterType::Sepia => {
            let l = luminance(rgb);
            [
                (l * 1.2 + 0.1).clamp(0.0, 1.0),
                (l * 0.9 + 0.05).clamp(0.0, 1.0),
                (l * 0.7).clamp(0.0, 1.0),
            ]
        }

        FilterType::Noir => {
            let l = ((luminance(rgb) - 0.5) * 2.0 + 0.5).clamp(0.0, 1.0);
            [l; 3]
        }

        FilterType::Vivid => saturate(rgb, 1.4).map(|c| ((c - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0)),

        FilterType::Cool => [
            (rgb[0] * 0.9).clamp(0.0, 1.0),
            (rgb[1] * 0.95).clamp(0.0, 1.0),
            (rgb[2] * 1.1).clamp(0.0, 1.0),
        ],

        FilterType::Warm => [
            (rgb[0] * 1.1).clamp(0.0, 1.0),
            rgb[1],
            (rgb[2] * 0.85).clamp(0.0, 1.0),
        ],

        FilterType::Fade => saturate(rgb.map(|c| (c * 0.85 + 0.1).clamp(0.0, 1.0)), 0.7),

        FilterType::Vignette => {
            let dx = u - 0.5;
            let dy = v - 0.5;
            let falloff = 1.0 - smoothstep(0.3, 0.9, (dx * dx + dy * dy).sqrt());
            rgb.map(|c| c * falloff)
        }

        FilterType::Negative => rgb.map(|c| 1.0 - c),

        FilterType::Posterize => rgb.map(|c| (c * 4.0).floor().min(3.0) / 3.0),
    }
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
