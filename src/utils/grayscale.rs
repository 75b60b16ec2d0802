//! Luminance extraction for camera frames
//! Y = 0.299*R + 0.587*G + 0.114*B
//! Uses fast integer arithmetic: Y = (76*R + 150*G + 29*B) >> 8
//!
//! NV12 frames already carry a full-range luma plane, which is copied row by
//! row (dropping stride padding). Packed RGB/RGBA rows are converted in
//! parallel on the rayon pool.
use image::GrayImage;
use rayon::prelude::*;

use crate::models::{Frame, PixelFormat};

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: i32 = 76;
const COEF_G: i32 = 150;
const COEF_B: i32 = 29;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as i32 + COEF_G * g as i32 + COEF_B * b as i32) >> 8;
    lum.min(255) as u8
}

/// Extract the luminance plane of a frame.
///
/// The frame must be well formed (see [`Frame::is_well_formed`]).
pub fn frame_to_luma(frame: &Frame) -> GrayImage {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride;
    let data = &frame.data[..];
    let mut gray = vec![0u8; width * height];

    match frame.format {
        PixelFormat::Luma8 | PixelFormat::Nv12 => {
            for (y, row) in gray.chunks_exact_mut(width).enumerate() {
                let start = y * stride;
                row.copy_from_slice(&data[start..start + width]);
            }
        }
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
            let bpp = frame.format.bytes_per_pixel();
            gray.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
                let row_start = y * stride;
                for (x, out) in row.iter_mut().enumerate() {
                    let idx = row_start + x * bpp;
                    *out = luma(data[idx], data[idx + 1], data[idx + 2]);
                }
            });
        }
    }

    GrayImage::from_raw(frame.width, frame.height, gray)
        .unwrap_or_else(|| GrayImage::new(frame.width, frame.height))
}

/// Convert packed RGB to full-range NV12 (luma plane + interleaved CbCr at
/// half resolution, chroma averaged over each 2x2 block).
///
/// Returns the buffer and its stride (equal to `width` rounded up to even).
pub fn rgb_to_nv12(rgb: &[u8], width: usize, height: usize) -> (Vec<u8>, usize) {
    let stride = width + (width & 1);
    let chroma_rows = height.div_ceil(2);
    let mut out = vec![0u8; stride * height + stride * chroma_rows];
    let (luma_plane, chroma_plane) = out.split_at_mut(stride * height);

    luma_plane
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let row_start = y * width * 3;
            for x in 0..width {
                let idx = row_start + x * 3;
                row[x] = luma(rgb[idx], rgb[idx + 1], rgb[idx + 2]);
            }
        });

    chroma_plane
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(cy, row)| {
            for cx in 0..width.div_ceil(2) {
                let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
                for y in (cy * 2)..((cy * 2 + 2).min(height)) {
                    for x in (cx * 2)..((cx * 2 + 2).min(width)) {
                        let idx = (y * width + x) * 3;
                        r += rgb[idx] as i32;
                        g += rgb[idx + 1] as i32;
                        b += rgb[idx + 2] as i32;
                        n += 1;
                    }
                }
                let (r, g, b) = (r / n, g / n, b / n);
                let cb = ((-43 * r - 85 * g + 128 * b) >> 8) + 128;
                let cr = ((128 * r - 107 * g - 21 * b) >> 8) + 128;
                row[cx * 2] = cb.clamp(0, 255) as u8;
                row[cx * 2 + 1] = cr.clamp(0, 255) as u8;
            }
        });

    (out, stride)
}
