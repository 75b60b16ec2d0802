/// Otsu's threshold for a run of grayscale samples.
///
/// Pixels strictly below the returned value are dark. Returns `None` when the
/// samples hold a single intensity, since no split exists.
pub fn otsu_threshold(gray: &[u8]) -> Option<u8> {
    let mut histogram = [0u32; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as f64;
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut dark_count = 0.0f64;
    let mut dark_sum = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut best: Option<u8> = None;

    // Split "t" puts intensities 0..t in the dark class.
    for t in 1..=255usize {
        let count = histogram[t - 1] as f64;
        dark_count += count;
        dark_sum += (t - 1) as f64 * count;

        let light_count = total - dark_count;
        if dark_count == 0.0 || light_count == 0.0 {
            continue;
        }

        let dark_mean = dark_sum / dark_count;
        let light_mean = (total_sum - dark_sum) / light_count;
        let variance = dark_count * light_count * (dark_mean - light_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best = Some(t as u8);
        }
    }

    best
}

/// Binarize one row of samples: `true` = dark (bar), `false` = light (space)
pub fn binarize_row(row: &[u8], threshold: u8) -> Vec<bool> {
    row.iter().map(|&v| v < threshold).collect()
}

/// Minimum dark/light separation for a row to be worth decoding
pub fn contrast(row: &[u8]) -> u8 {
    let (min, max) = row
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    max.saturating_sub(min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otsu_two_classes() {
        let mut gray = vec![50u8; 50];
        gray.extend(vec![200u8; 50]);

        let threshold = otsu_threshold(&gray).unwrap();
        assert!(threshold > 50 && threshold <= 200);

        let binary = binarize_row(&gray, threshold);
        assert!(binary[0]);
        assert!(!binary[99]);
    }

    #[test]
    fn test_otsu_flat_input() {
        assert_eq!(otsu_threshold(&[128u8; 64]), None);
        assert_eq!(otsu_threshold(&[]), None);
    }

    #[test]
    fn test_contrast() {
        assert_eq!(contrast(&[10, 200, 30]), 190);
        assert_eq!(contrast(&[7, 7]), 0);
    }
}
