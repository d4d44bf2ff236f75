use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capture::RasterFormat;

/// Prefix for environment variables overriding settings
pub const ENV_PREFIX: &str = "QUICK_VRT";

/// Fallback diff color when the configured hex string cannot be parsed
pub const DEFAULT_DIFF_COLOR: [u8; 3] = [255, 0, 0];

/// Requested quality of captured rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    High,
    #[default]
    Medium,
    Low,
}

impl ImageQuality {
    /// Raster format requested from the target for this quality level
    ///
    /// Every level captures lossless PNG. A lossy capture would count its own
    /// compression noise as differing pixels, so the level is only a hint.
    pub fn raster_format(self) -> RasterFormat {
        match self {
            ImageQuality::High | ImageQuality::Medium | ImageQuality::Low => RasterFormat::Png,
        }
    }
}

/// User-facing settings consumed read-only by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrtSettings {
    /// Delay before each capture
    pub capture_delay_ms: u64,
    pub image_quality: ImageQuality,
    /// Scroll through the page before a single-viewport capture
    pub auto_scroll: bool,
    /// Differ tolerance, 0..1
    pub diff_threshold: f64,
    /// Hex color (`#rrggbb`) used to paint differing pixels
    pub diff_color: String,
}

impl Default for VrtSettings {
    fn default() -> Self {
        Self {
            capture_delay_ms: 1000,
            image_quality: ImageQuality::Medium,
            auto_scroll: false,
            diff_threshold: 0.1,
            diff_color: "#ff0000".to_string(),
        }
    }
}

impl VrtSettings {
    /// Loads settings from an optional file layered under `QUICK_VRT_*` env vars
    ///
    /// Missing keys keep their defaults. A missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Loading settings file: {}", path);
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let settings: VrtSettings = builder
            .build()
            .context("Failed to assemble settings sources")?
            .try_deserialize()
            .context("Failed to deserialize settings")?;

        Ok(settings.sanitized())
    }

    /// Clamps the threshold into 0..1
    pub fn sanitized(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.diff_threshold) || self.diff_threshold.is_nan() {
            warn!("diff_threshold {} out of range, clamping", self.diff_threshold);
            self.diff_threshold = if self.diff_threshold.is_nan() {
                0.1
            } else {
                self.diff_threshold.clamp(0.0, 1.0)
            };
        }
        self
    }

    /// Diff color as an RGB triple, red when the hex string is malformed
    pub fn diff_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.diff_color).unwrap_or_else(|| {
            warn!("Invalid diff color {:?}, using red", self.diff_color);
            DEFAULT_DIFF_COLOR
        })
    }
}

/// Parses `#rrggbb` (leading `#` optional, case-insensitive)
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = VrtSettings::default();
        assert_eq!(settings.capture_delay_ms, 1000);
        assert_eq!(settings.image_quality, ImageQuality::Medium);
        assert!(!settings.auto_scroll);
        assert_eq!(settings.diff_threshold, 0.1);
        assert_eq!(settings.diff_rgb(), [255, 0, 0]);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#00ff7F"), Some([0, 255, 127]));
        assert_eq!(parse_hex_color("0000ff"), Some([0, 0, 255]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn malformed_color_falls_back_to_red() {
        let settings = VrtSettings {
            diff_color: "blue".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.diff_rgb(), DEFAULT_DIFF_COLOR);
    }

    #[test]
    fn threshold_is_clamped() {
        let settings = VrtSettings {
            diff_threshold: 3.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.diff_threshold, 1.0);
    }

    #[test]
    fn load_without_file_uses_defaults() -> Result<()> {
        let settings = VrtSettings::load(Some("definitely_missing_settings_file"))?;
        assert_eq!(settings.diff_color, "#ff0000");
        Ok(())
    }

    #[test]
    fn load_reads_toml_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vrt.toml");
        std::fs::write(&path, "diff_threshold = 0.25\nimage_quality = \"low\"\n")?;
        let settings = VrtSettings::load(path.to_str())?;
        assert_eq!(settings.diff_threshold, 0.25);
        assert_eq!(settings.image_quality, ImageQuality::Low);
        assert_eq!(settings.capture_delay_ms, 1000);
        Ok(())
    }

    #[test]
    fn every_quality_captures_lossless() {
        for quality in [ImageQuality::High, ImageQuality::Medium, ImageQuality::Low] {
            assert_eq!(quality.raster_format(), RasterFormat::Png, "{:?}", quality);
        }
    }
}
