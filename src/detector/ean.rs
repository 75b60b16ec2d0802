//! EAN-13 / EAN-8 scanline reader
//!
//! Each sampled row is thresholded on its own (Otsu), run-length encoded and
//! searched for a start guard followed by the digit groups, the middle guard
//! and the end guard. Rows read right-to-left are retried reversed, which
//! covers codes that are upside down. UPC-A codes decode as EAN-13 with a
//! leading zero.
//!
//! Rows vote: a payload's confidence is the share of overlapping row decodes
//! that agree with it, weighted by how cleanly its digits matched.

use std::collections::HashMap;

use image::GrayImage;
use rayon::prelude::*;
use tracing::trace;

use super::SymbologyReader;
use crate::models::{BarcodeObservation, Point, Symbology};
use crate::utils::binarization::{binarize_row, contrast, otsu_threshold};

/// Module widths of the odd-parity ("L") digit codes, light run first.
/// Even-parity ("G") codes are the same widths reversed; right-hand ("R")
/// codes are the L widths starting with a dark run.
pub(crate) const L_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Parity of the six left-hand EAN-13 digits (bit 5 = first, 1 = even)
/// indexed by the implied leading digit.
pub(crate) const FIRST_DIGIT_PARITY: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

const MIN_CONTRAST: u8 = 24;
/// Largest summed width error (in modules) accepted for one digit
const MAX_DIGIT_ERROR: f32 = 1.5;
/// Quiet zone required next to the guards, in modules
const QUIET_MODULES: f32 = 3.0;

#[derive(Debug, Clone, Copy)]
struct Run {
    dark: bool,
    start: usize,
    len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    Odd,
    Even,
}

#[derive(Debug, Clone)]
struct RowDecode {
    symbology: Symbology,
    digits: String,
    quality: f32,
    x0: usize,
    x1: usize,
    y: usize,
}

/// Scanline reader for EAN-13 (and UPC-A) and EAN-8
#[derive(Debug, Clone)]
pub struct EanReader {
    scanlines: usize,
    ean13: bool,
    ean8: bool,
}

impl EanReader {
    /// Reader sampling `scanlines` evenly spaced rows (at least one)
    pub fn new(scanlines: usize) -> Self {
        Self {
            scanlines: scanlines.max(1),
            ean13: true,
            ean8: true,
        }
    }

    /// Restrict reporting to the given symbologies
    pub fn with_symbologies(mut self, symbologies: &[Symbology]) -> Self {
        self.ean13 = symbologies.contains(&Symbology::Ean13);
        self.ean8 = symbologies.contains(&Symbology::Ean8);
        self
    }

    fn sample_rows(&self, height: usize) -> Vec<usize> {
        if height <= self.scanlines {
            return (0..height).collect();
        }
        (0..self.scanlines)
            .map(|k| ((2 * k + 1) * height) / (2 * self.scanlines))
            .collect()
    }

    fn read_row(&self, row: &[u8], y: usize) -> Vec<RowDecode> {
        if contrast(row) < MIN_CONTRAST {
            return Vec::new();
        }
        let Some(threshold) = otsu_threshold(row) else {
            return Vec::new();
        };
        let runs = runs_of(&binarize_row(row, threshold));

        let forward = self.scan_runs(&runs, y);
        if !forward.is_empty() {
            return forward;
        }
        let reversed: Vec<Run> = runs.into_iter().rev().collect();
        self.scan_runs(&reversed, y)
    }

    fn scan_runs(&self, runs: &[Run], y: usize) -> Vec<RowDecode> {
        let mut decodes = Vec::new();
        let mut i = 1;
        while i + 2 < runs.len() {
            if runs[i].dark {
                if let Some((decode, next)) = self.decode_at(runs, i, y) {
                    decodes.push(decode);
                    i = next;
                    continue;
                }
            }
            i += 1;
        }
        decodes
    }

    fn decode_at(&self, runs: &[Run], i: usize, y: usize) -> Option<(RowDecode, usize)> {
        let guard = &runs[i..i + 3];
        let module = guard.iter().map(|r| r.len).sum::<usize>() as f32 / 3.0;
        if !guard_ok(guard, module) || (runs[i - 1].len as f32) < QUIET_MODULES * module {
            return None;
        }

        if self.ean13 {
            if let Some(found) = decode_symbol(runs, i, module, 6, y) {
                return Some(found);
            }
        }
        if self.ean8 {
            if let Some(found) = decode_symbol(runs, i, module, 4, y) {
                return Some(found);
            }
        }
        None
    }
}

impl Default for EanReader {
    fn default() -> Self {
        Self::new(16)
    }
}

impl SymbologyReader for EanReader {
    fn symbologies(&self) -> &'static [Symbology] {
        match (self.ean13, self.ean8) {
            (true, true) => &[Symbology::Ean13, Symbology::Ean8],
            (true, false) => &[Symbology::Ean13],
            (false, true) => &[Symbology::Ean8],
            (false, false) => &[],
        }
    }

    fn read(&self, image: &GrayImage) -> Vec<BarcodeObservation> {
        let width = image.width() as usize;
        let height = image.height() as usize;
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let raw = image.as_raw();
        let decodes: Vec<RowDecode> = self
            .sample_rows(height)
            .into_par_iter()
            .flat_map_iter(|y| self.read_row(&raw[y * width..(y + 1) * width], y))
            .collect();
        tally(decodes)
    }
}

fn runs_of(bits: &[bool]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (x, &dark) in bits.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.dark == dark => run.len += 1,
            _ => runs.push(Run {
                dark,
                start: x,
                len: 1,
            }),
        }
    }
    runs
}

fn guard_ok(runs: &[Run], module: f32) -> bool {
    let tolerance = (module * 0.5).max(1.0);
    runs.iter()
        .all(|r| (r.len as f32 - module).abs() <= tolerance)
}

/// Match four runs against the digit table. Returns digit, parity and the
/// summed width error in modules.
fn match_digit(group: &[Run], allow_even: bool) -> Option<(u8, Parity, f32)> {
    let total: usize = group.iter().map(|r| r.len).sum();
    if total == 0 {
        return None;
    }
    let unit = total as f32 / 7.0;
    let norm: Vec<f32> = group.iter().map(|r| r.len as f32 / unit).collect();

    let error = |widths: [u8; 4]| -> f32 {
        norm.iter()
            .zip(widths.iter())
            .map(|(n, &w)| (n - w as f32).abs())
            .sum()
    };

    let mut best: Option<(u8, Parity, f32)> = None;
    for (digit, widths) in L_WIDTHS.iter().enumerate() {
        let mut candidates = vec![(Parity::Odd, error(*widths))];
        if allow_even {
            let mut reversed = *widths;
            reversed.reverse();
            candidates.push((Parity::Even, error(reversed)));
        }
        for (parity, err) in candidates {
            if best.is_none_or(|(_, _, e)| err < e) {
                best = Some((digit as u8, parity, err));
            }
        }
    }
    best.filter(|&(_, _, err)| err <= MAX_DIGIT_ERROR)
}

/// Decode a full symbol whose start guard begins at run `i`; `half` is the
/// digit count per side (6 for EAN-13, 4 for EAN-8). Returns the decode and
/// the index of the first run after the end guard.
fn decode_symbol(
    runs: &[Run],
    i: usize,
    module: f32,
    half: usize,
    y: usize,
) -> Option<(RowDecode, usize)> {
    let mut pos = i + 3;
    let mut left = Vec::with_capacity(half);
    let mut right = Vec::with_capacity(half);
    let mut parity_mask = 0u8;
    let mut error_sum = 0.0f32;

    for _ in 0..half {
        let group = runs.get(pos..pos + 4)?;
        if group[0].dark || !plausible_width(group, module) {
            return None;
        }
        let (digit, parity, err) = match_digit(group, half == 6)?;
        parity_mask = (parity_mask << 1) | u8::from(parity == Parity::Even);
        left.push(digit);
        error_sum += err;
        pos += 4;
    }

    let middle = runs.get(pos..pos + 5)?;
    if middle[0].dark || !guard_ok(middle, module) {
        return None;
    }
    pos += 5;

    for _ in 0..half {
        let group = runs.get(pos..pos + 4)?;
        if !group[0].dark || !plausible_width(group, module) {
            return None;
        }
        let (digit, _, err) = match_digit(group, false)?;
        right.push(digit);
        error_sum += err;
        pos += 4;
    }

    let end = runs.get(pos..pos + 3)?;
    if !end[0].dark || !guard_ok(end, module) {
        return None;
    }
    pos += 3;
    if let Some(after) = runs.get(pos) {
        if (after.len as f32) < QUIET_MODULES * module {
            return None;
        }
    }

    let (symbology, digits) = if half == 6 {
        let first = FIRST_DIGIT_PARITY.iter().position(|&m| m == parity_mask)? as u8;
        let mut digits = vec![first];
        digits.extend(left);
        digits.extend(right);
        (Symbology::Ean13, digits)
    } else {
        if parity_mask != 0 {
            return None;
        }
        let mut digits = left;
        digits.extend(right);
        (Symbology::Ean8, digits)
    };

    if !checksum_ok(&digits) {
        return None;
    }

    let digit_count = (half * 2) as f32;
    let quality = (1.0 - (error_sum / digit_count) / 4.0).clamp(0.0, 1.0);
    let first_run = &runs[i];
    let last_run = &runs[pos - 1];
    let x0 = first_run.start.min(last_run.start);
    let x1 = (first_run.start + first_run.len).max(last_run.start + last_run.len);

    Some((
        RowDecode {
            symbology,
            digits: digits.iter().map(|d| char::from(b'0' + d)).collect(),
            quality,
            x0,
            x1,
            y,
        },
        pos,
    ))
}

/// A digit spans seven modules; reject groups far off the guard's module size.
fn plausible_width(group: &[Run], module: f32) -> bool {
    let unit = group.iter().map(|r| r.len).sum::<usize>() as f32 / 7.0;
    unit >= module * 0.6 && unit <= module * 1.5
}

/// Check digit for EAN / UPC data digits (weights 3,1,3,... from the right)
pub fn check_digit(data: &[u8]) -> u8 {
    let sum: u32 = data
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn checksum_ok(digits: &[u8]) -> bool {
    match digits.split_last() {
        Some((&check, data)) if !data.is_empty() => check_digit(data) == check,
        _ => false,
    }
}

fn tally(decodes: Vec<RowDecode>) -> Vec<BarcodeObservation> {
    let mut groups: HashMap<(Symbology, String), Vec<&RowDecode>> = HashMap::new();
    for decode in &decodes {
        groups
            .entry((decode.symbology, decode.digits.clone()))
            .or_default()
            .push(decode);
    }

    let mut found: Vec<BarcodeObservation> = groups
        .into_iter()
        .map(|((symbology, digits), rows)| {
            let x0 = rows.iter().map(|r| r.x0).min().unwrap_or(0);
            let x1 = rows.iter().map(|r| r.x1).max().unwrap_or(0);
            let y0 = rows.iter().map(|r| r.y).min().unwrap_or(0);
            let y1 = rows.iter().map(|r| r.y).max().unwrap_or(0);

            let votes = rows.len();
            let conflicts = decodes
                .iter()
                .filter(|d| d.digits != digits && d.x0 < x1 && x0 < d.x1)
                .count();
            let agreement = votes as f32 / (votes + conflicts) as f32;
            let quality = rows.iter().map(|r| r.quality).sum::<f32>() / votes as f32;

            trace!(%digits, votes, conflicts, "EAN rows tallied");
            let corners = [
                Point::new(x0 as f32, y0 as f32),
                Point::new(x1 as f32, y0 as f32),
                Point::new(x1 as f32, y1 as f32),
                Point::new(x0 as f32, y1 as f32),
            ];
            BarcodeObservation::new(Some(digits), symbology, agreement * quality)
                .with_corners(corners)
        })
        .collect();

    // HashMap iteration order is arbitrary; keep output stable for callers.
    found.sort_by(|a, b| a.payload().cmp(&b.payload()));
    found
}
