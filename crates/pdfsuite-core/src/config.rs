//! Engine configuration
//!
//! Every field has a default, so an empty TOML document (or
//! [`EngineConfig::default`]) yields the standard behavior. The engine never
//! reads configuration on its own; callers pass it to the orchestrator.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::StandardFont;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub signature: SignaturePlacement,
    /// Width and height in points for pages added without explicit geometry.
    /// See [`EngineConfig::page_size`].
    #[serde(default = "default_page_size")]
    pub default_page_size: [f32; 2],
    #[serde(default)]
    pub default_font: StandardFont,
    #[serde(default = "default_font_size")]
    pub default_font_size: f32,
    #[serde(default)]
    pub output: OutputNaming,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compression: CompressionConfig::default(),
            signature: SignaturePlacement::default(),
            default_page_size: default_page_size(),
            default_font: StandardFont::default(),
            default_font_size: default_font_size(),
            output: OutputNaming::default(),
        }
    }
}

fn default_page_size() -> [f32; 2] {
    let (width, height) = crate::pages::DEFAULT_PAGE_SIZE;
    [width, height]
}

fn default_font_size() -> f32 {
    12.0
}

impl EngineConfig {
    /// `default_page_size` in the form `pages::add_page` takes.
    pub fn page_size(&self) -> (f32, f32) {
        let [width, height] = self.default_page_size;
        (width, height)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, tier) in [
            ("low", &self.compression.low),
            ("medium", &self.compression.medium),
            ("high", &self.compression.high),
        ] {
            anyhow::ensure!(
                tier.quality > 0.0 && tier.quality <= 1.0,
                "compression.{}.quality must be in (0, 1], got {}",
                name,
                tier.quality
            );
            if let Some(dpi) = tier.max_dpi {
                anyhow::ensure!(dpi > 0.0, "compression.{}.max_dpi must be positive", name);
            }
        }
        anyhow::ensure!(
            self.signature.scale > 0.0,
            "signature.scale must be positive"
        );
        let [w, h] = self.default_page_size;
        anyhow::ensure!(w > 0.0 && h > 0.0, "default_page_size must be positive");
        Ok(())
    }
}

/// Re-encoding parameters of one compression tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierSettings {
    /// Images displayed above this resolution are downsampled to it.
    /// `None` leaves resolution unconstrained.
    #[serde(default)]
    pub max_dpi: Option<f32>,
    /// JPEG quality in (0, 1].
    pub quality: f32,
    #[serde(default)]
    pub structural_compaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_low")]
    pub low: TierSettings,
    #[serde(default = "default_medium")]
    pub medium: TierSettings,
    #[serde(default = "default_high")]
    pub high: TierSettings,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            low: default_low(),
            medium: default_medium(),
            high: default_high(),
        }
    }
}

fn default_low() -> TierSettings {
    TierSettings {
        max_dpi: None,
        quality: 0.9,
        structural_compaction: false,
    }
}

fn default_medium() -> TierSettings {
    TierSettings {
        max_dpi: Some(300.0),
        quality: 0.6,
        structural_compaction: true,
    }
}

fn default_high() -> TierSettings {
    TierSettings {
        max_dpi: Some(150.0),
        quality: 0.3,
        structural_compaction: true,
    }
}

/// Where a signature lands when the caller gives no position: the
/// bottom-right corner, `margin` points in from both edges, at `scale`
/// times the image's pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignaturePlacement {
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

impl Default for SignaturePlacement {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            scale: default_scale(),
        }
    }
}

fn default_margin() -> f32 {
    50.0
}

fn default_scale() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNaming {
    #[serde(default = "default_merged_name")]
    pub merged_name: String,
    /// Used as the original name when an input has none.
    #[serde(default = "default_name")]
    pub default_name: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            merged_name: default_merged_name(),
            default_name: default_name(),
        }
    }
}

fn default_merged_name() -> String {
    "merged.pdf".to_string()
}

fn default_name() -> String {
    "document.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_is_default() {
        let config = EngineConfig::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.compression.medium.max_dpi, Some(300.0));
        assert_eq!(config.compression.high.quality, 0.3);
        assert!(!config.compression.low.structural_compaction);
        assert_eq!(config.signature.margin, 50.0);
        assert_eq!(config.output.merged_name, "merged.pdf");
    }

    #[test]
    fn test_partial_override() {
        let toml = r#"
            default_font = "Courier"
            default_page_size = [595.0, 842.0]

            [compression.high]
            max_dpi = 96.0
            quality = 0.25
            structural_compaction = true

            [signature]
            margin = 36.0
        "#;
        let config = EngineConfig::from_str(toml).unwrap();
        assert_eq!(config.default_font, StandardFont::Courier);
        assert_eq!(config.page_size(), (595.0, 842.0));
        assert_eq!(config.compression.high.max_dpi, Some(96.0));
        assert_eq!(config.compression.medium, default_medium());
        assert_eq!(config.signature.margin, 36.0);
        assert_eq!(config.signature.scale, 0.5);
    }

    #[test]
    fn test_rejects_bad_quality() {
        let toml = r#"
            [compression.low]
            quality = 1.5
        "#;
        let err = EngineConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("compression.low.quality"));
    }

    #[test]
    fn test_malformed_toml_has_context() {
        let err = EngineConfig::from_str("default_font = [").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML configuration"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = EngineConfig::from_file("/nonexistent/pdfsuite.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
