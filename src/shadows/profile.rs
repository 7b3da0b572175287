// src/shadows/profile.rs
// Named quality presets bundling map resolution, prefiltering, and
// evaluation settings, with JSON round-tripping for config files
// RELEVANT FILES: src/shadows/estimator.rs, src/shadows/pipeline.rs, src/shadows/target.rs

use serde::{Deserialize, Serialize};

use super::estimator::VsmSettings;

pub const MIN_RESOLUTION: u32 = 256;
pub const MAX_RESOLUTION: u32 = 8192;

/// A complete shadow-quality configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VsmProfile {
    pub name: String,
    /// Square moment map edge in texels
    pub resolution: u32,
    /// Run the separable Gaussian blur over the moment map after rendering
    pub prefilter: bool,
    pub settings: VsmSettings,
}

impl VsmProfile {
    /// 1K map, no prefilter; the tuning the source scenes ran at
    pub fn balanced() -> Self {
        Self {
            name: "balanced".to_string(),
            resolution: 1024,
            prefilter: false,
            settings: VsmSettings::default(),
        }
    }

    /// 8K map with prefiltering; the eval kernel shrinks because the blur
    /// already did the widening
    pub fn fine() -> Self {
        Self {
            name: "fine".to_string(),
            resolution: 8192,
            prefilter: true,
            settings: VsmSettings {
                kernel_radius: 2,
                ..VsmSettings::default()
            },
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("profile name must not be empty".to_string());
        }
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.resolution) {
            return Err(format!(
                "resolution must be in [{}, {}], got {}",
                MIN_RESOLUTION, MAX_RESOLUTION, self.resolution
            ));
        }
        self.settings.validate()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for VsmProfile {
    fn default() -> Self {
        Self::balanced()
    }
}
