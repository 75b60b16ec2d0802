//! Helpers shared by the binaries, benches and tests: loading still images as
//! camera frames and rendering synthetic EAN symbols.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use image::{GenericImageView, GrayImage, Luma};

use crate::detector::ean::{FIRST_DIGIT_PARITY, L_WIDTHS, check_digit};
use crate::models::{Frame, PixelFormat};

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "tif"];

/// Longest image side allowed when loading, from `SCAN_MAX_DIM`.
///
/// Unset, unparsable or `0` means no limit.
pub fn max_dim_from_env() -> Option<u32> {
    match env::var("SCAN_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

/// Load an image file as a packed RGB frame, shrinking it so neither side
/// exceeds `max_dim`.
pub fn load_frame<P: AsRef<Path>>(path: P, max_dim: Option<u32>) -> Result<Frame, image::ImageError> {
    let img = image::open(path)?;
    let img = match max_dim {
        Some(max_dim) if img.dimensions().0.max(img.dimensions().1) > max_dim => {
            img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
        }
        _ => img,
    };
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::packed(width, height, PixelFormat::Rgb8, rgb.into_raw()))
}

/// True when the path has an image file extension this crate can decode
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Image files directly inside `root`, sorted by name.
pub fn image_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_path(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Module sequence (`true` = bar) of an EAN-13 or EAN-8 code, guards included.
///
/// Accepts 12/13 digits for EAN-13 and 7/8 for EAN-8; a missing check digit
/// is computed. A supplied check digit is encoded as given, even when wrong.
pub fn ean_modules(code: &str) -> Option<Vec<bool>> {
    let mut digits: Vec<u8> = code
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()?;
    if digits.len() == 12 || digits.len() == 7 {
        digits.push(check_digit(&digits));
    }

    let (parity, left, right) = match digits.len() {
        13 => (FIRST_DIGIT_PARITY[digits[0] as usize], &digits[1..7], &digits[7..13]),
        8 => (0u8, &digits[0..4], &digits[4..8]),
        _ => return None,
    };

    let mut modules = Vec::with_capacity(95);
    let push_widths = |modules: &mut Vec<bool>, widths: [u8; 4], dark_first: bool| {
        for (k, &w) in widths.iter().enumerate() {
            let dark = (k % 2 == 0) == dark_first;
            modules.extend(std::iter::repeat_n(dark, w as usize));
        }
    };

    modules.extend([true, false, true]);
    for (idx, &d) in left.iter().enumerate() {
        let even = (parity >> (left.len() - 1 - idx)) & 1 == 1;
        let mut widths = L_WIDTHS[d as usize];
        if even {
            widths.reverse();
        }
        push_widths(&mut modules, widths, false);
    }
    modules.extend([false, true, false, true, false]);
    for &d in right {
        push_widths(&mut modules, L_WIDTHS[d as usize], true);
    }
    modules.extend([true, false, true]);
    Some(modules)
}

/// Render an EAN code as a grayscale image: black bars on white, `module_px`
/// pixels per module, ten quiet modules on each side.
pub fn synthesize_ean(code: &str, module_px: u32, height: u32) -> Option<GrayImage> {
    let modules = ean_modules(code)?;
    let quiet = 10usize;
    let module_px = module_px.max(1);
    let width = (modules.len() + 2 * quiet) as u32 * module_px;
    Some(GrayImage::from_fn(width, height.max(1), |x, _| {
        let module = (x / module_px) as usize;
        let dark = module
            .checked_sub(quiet)
            .and_then(|m| modules.get(m))
            .copied()
            .unwrap_or(false);
        Luma([if dark { 0 } else { 255 }])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ean_modules_guards() {
        let modules = ean_modules("5901234123457").unwrap();
        assert_eq!(&modules[..3], &[true, false, true]);
        assert_eq!(&modules[45..50], &[false, true, false, true, false]);
        assert_eq!(&modules[92..], &[true, false, true]);
    }

    #[test]
    fn test_ean_modules_computes_check_digit() {
        assert_eq!(ean_modules("590123412345"), ean_modules("5901234123457"));
        assert!(ean_modules("59012x4123457").is_none());
    }

    #[test]
    fn test_first_left_digit_encoding() {
        // Leading 5 -> parity LGGLLG; second digit 9 in L = 0001011
        let modules = ean_modules("5901234123457").unwrap();
        let digit: Vec<bool> = modules[3..10].to_vec();
        assert_eq!(digit, vec![false, false, false, true, false, true, true]);
    }

    #[test]
    fn test_synthesize_dimensions() {
        let image = synthesize_ean("96385074", 2, 5).unwrap();
        assert_eq!(image.dimensions(), ((67 + 20) * 2, 5));
        assert_eq!(image.get_pixel(0, 0)[0], 255);
        assert_eq!(image.get_pixel(20, 0)[0], 0);
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("a/b/frame001.PNG")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("noext")));
    }
}
