//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::material::SurfaceBsdf;

/// Default samples per pixel.
const DEFAULT_SAMPLES: u32 = 16;
/// Default path length limit.
const DEFAULT_MAX_BOUNCES: u32 = 8;

/// Path tracer settings sent with `create_integrator`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSettings {
    #[serde(default = "IntegratorSettings::default_max_bounces")]
    pub max_bounces: u32,
    /// Sample lights with multiple importance sampling.
    #[serde(default = "IntegratorSettings::default_light_sampling")]
    pub light_sampling: bool,
    #[serde(default)]
    pub avoid_caustics: bool,
}

impl IntegratorSettings {
    fn default_max_bounces() -> u32 {
        DEFAULT_MAX_BOUNCES
    }

    fn default_light_sampling() -> bool {
        true
    }

    /// Serialize as `{"surface": {"PTMIS": {...}}}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let descriptor = serde_json::json!({
            "surface": {
                "PTMIS": {
                    "max_bounces": self.max_bounces,
                    "light_sampling": if self.light_sampling { "Adaptive" } else { "Single" },
                    "caustics": !self.avoid_caustics,
                }
            }
        });
        serde_json::to_string(&descriptor)
    }
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            max_bounces: DEFAULT_MAX_BOUNCES,
            light_sampling: true,
            avoid_caustics: false,
        }
    }
}

/// Runtime configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_samples")]
    pub samples_per_pixel: u32,
    #[serde(default)]
    pub integrator: IntegratorSettings,
    /// Surface used for objects without a translatable material.
    #[serde(default)]
    pub default_material: SurfaceBsdf,
    /// Framebuffer layer copied back to the host.
    #[serde(default)]
    pub layer: u32,
}

impl SessionConfig {
    fn default_samples() -> u32 {
        DEFAULT_SAMPLES
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config.with_env_overrides())
    }

    /// Apply `ZYG_SAMPLES` and `ZYG_MAX_BOUNCES` when set and valid.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(samples) = env_u32("ZYG_SAMPLES") {
            self.samples_per_pixel = samples;
        }
        if let Some(bounces) = env_u32("ZYG_MAX_BOUNCES") {
            self.integrator.max_bounces = bounces;
        }
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: DEFAULT_SAMPLES,
            integrator: IntegratorSettings::default(),
            default_material: SurfaceBsdf::default(),
            layer: 0,
        }
        .with_env_overrides()
    }
}

fn env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"layer": 2}"#).unwrap();
        assert_eq!(config.layer, 2);
        assert_eq!(config.samples_per_pixel, DEFAULT_SAMPLES);
        assert_eq!(config.integrator.max_bounces, DEFAULT_MAX_BOUNCES);
        assert!(config.default_material.two_sided);
    }

    #[test]
    fn test_integrator_json_layout() {
        let settings = IntegratorSettings {
            max_bounces: 4,
            light_sampling: false,
            avoid_caustics: true,
        };
        let value: serde_json::Value = serde_json::from_str(&settings.to_json().unwrap()).unwrap();
        let ptmis = &value["surface"]["PTMIS"];
        assert_eq!(ptmis["max_bounces"], 4);
        assert_eq!(ptmis["light_sampling"], "Single");
        assert_eq!(ptmis["caustics"], false);
    }

    #[test]
    fn test_from_file_reads_json() {
        let path = std::env::temp_dir().join(format!("zyg-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"samples_per_pixel": 64, "integrator": {"max_bounces": 3}}"#)
            .unwrap();
        let config = SessionConfig::from_file(&path);
        std::fs::remove_file(&path).ok();
        let config = config.unwrap();
        // Environment overrides may apply on a developer machine.
        if std::env::var("ZYG_SAMPLES").is_err() {
            assert_eq!(config.samples_per_pixel, 64);
        }
        if std::env::var("ZYG_MAX_BOUNCES").is_err() {
            assert_eq!(config.integrator.max_bounces, 3);
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SessionConfig::from_file(Path::new("/nonexistent/zyg.json")).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigIo(_)));
    }
}
