//! Runtime configuration.
//!
//! Every knob has a default and can be overridden from the environment:
//!
//! | Variable | Field | Example |
//! |---|---|---|
//! | `SCAN_PRESET` | [`ScanConfig::preset`] | `720p` |
//! | `SCAN_PIXEL_FORMAT` | [`ScanConfig::pixel_format`] | `rgb` |
//! | `SCAN_DISCARD_LATE` | [`ScanConfig::discard_late_frames`] | `0` |
//! | `SCAN_QUEUE_DEPTH` | [`ScanConfig::frame_queue_depth`] | `8` |
//! | `SCAN_SYMBOLOGIES` | [`DetectorConfig::symbologies`] | `qr,ean13` |
//! | `SCAN_EAN_SCANLINES` | [`DetectorConfig::ean_scanlines`] | `24` |
//!
//! Values that do not parse are ignored.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::capture::SessionPreset;
use crate::capture::device::DeviceQuery;
use crate::detector::SUPPORTED_SYMBOLOGIES;
use crate::models::{PixelFormat, Symbology};

/// Settings for the symbology readers
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Symbologies to look for
    pub symbologies: Vec<Symbology>,
    /// Rows sampled per frame by the EAN reader
    pub ean_scanlines: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            symbologies: vec![Symbology::Qr, Symbology::Ean13, Symbology::Ean8],
            ean_scanlines: 16,
        }
    }
}

/// Settings for the capture pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Resolution the session streams at
    pub preset: SessionPreset,
    /// Pixel layout requested from the video output
    pub pixel_format: PixelFormat,
    /// Drop frames that arrive while the previous one is still processing
    pub discard_late_frames: bool,
    /// Frames buffered when late frames are kept
    pub frame_queue_depth: usize,
    /// Which camera to bind
    pub device: DeviceQuery,
    /// Reader settings
    pub detector: DetectorConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preset: SessionPreset::Vga640x480,
            pixel_format: PixelFormat::Nv12,
            discard_late_frames: true,
            frame_queue_depth: 4,
            device: DeviceQuery::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Defaults overridden by `SCAN_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `SCAN_*` key
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(preset) = parsed(&lookup, "SCAN_PRESET") {
            config.preset = preset;
        }
        if let Some(format) = parsed(&lookup, "SCAN_PIXEL_FORMAT") {
            config.pixel_format = format;
        }
        if let Some(discard) = lookup("SCAN_DISCARD_LATE").and_then(|v| parse_flag(&v)) {
            config.discard_late_frames = discard;
        }
        match parsed::<usize, _>(&lookup, "SCAN_QUEUE_DEPTH") {
            Some(0) | None => {}
            Some(depth) => config.frame_queue_depth = depth,
        }
        if let Some(list) = lookup("SCAN_SYMBOLOGIES") {
            let symbologies = parse_symbologies(&list);
            if !symbologies.is_empty() {
                config.detector.symbologies = symbologies;
            }
        }
        match parsed::<usize, _>(&lookup, "SCAN_EAN_SCANLINES") {
            Some(0) | None => {}
            Some(lines) => config.detector.ean_scanlines = lines,
        }
        config
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match value.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %value, "ignoring unparsable setting");
            None
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a comma separated symbology list, skipping unknown names and
/// symbologies no reader can decode
pub fn parse_symbologies(list: &str) -> Vec<Symbology> {
    let mut out = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<Symbology>() {
            Ok(s) if !SUPPORTED_SYMBOLOGIES.contains(&s) => {
                warn!(name, "no reader for symbology, ignored")
            }
            Ok(s) if !out.contains(&s) => out.push(s),
            Ok(_) => {}
            Err(_) => warn!(name, "unknown symbology"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ScanConfig::from_lookup(|_| None);
        assert_eq!(config, ScanConfig::default());
        assert!(config.discard_late_frames);
        assert_eq!(config.pixel_format, PixelFormat::Nv12);
    }

    #[test]
    fn test_overrides() {
        let config = ScanConfig::from_lookup(lookup(&[
            ("SCAN_PRESET", "1080p"),
            ("SCAN_PIXEL_FORMAT", "rgb"),
            ("SCAN_DISCARD_LATE", "no"),
            ("SCAN_QUEUE_DEPTH", "8"),
            ("SCAN_SYMBOLOGIES", "ean13, qr, ean13"),
            ("SCAN_EAN_SCANLINES", "32"),
        ]));
        assert_eq!(config.preset, SessionPreset::Hd1920x1080);
        assert_eq!(config.pixel_format, PixelFormat::Rgb8);
        assert!(!config.discard_late_frames);
        assert_eq!(config.frame_queue_depth, 8);
        assert_eq!(config.detector.symbologies, vec![Symbology::Ean13, Symbology::Qr]);
        assert_eq!(config.detector.ean_scanlines, 32);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = ScanConfig::from_lookup(lookup(&[
            ("SCAN_PRESET", "8k"),
            ("SCAN_DISCARD_LATE", "maybe"),
            ("SCAN_QUEUE_DEPTH", "0"),
            ("SCAN_SYMBOLOGIES", "bogus"),
            ("SCAN_EAN_SCANLINES", "-3"),
        ]));
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_symbologies_without_reader_are_ignored() {
        assert_eq!(parse_symbologies("code128, aztec"), Vec::<Symbology>::new());
        assert_eq!(parse_symbologies("code128,ean8"), vec![Symbology::Ean8]);

        let config = ScanConfig::from_lookup(lookup(&[("SCAN_SYMBOLOGIES", "code128")]));
        assert_eq!(config.detector.symbologies, DetectorConfig::default().symbologies);
    }
}
