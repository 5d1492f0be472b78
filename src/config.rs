//! Host configuration for one widget.

use crate::{
    magnifier::MagnifierSettings,
    resolver::{DEFAULT_BASE_URL, EntityError, EntityRef},
    viewport::ViewportSettings,
};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use ssview_protocol::{DEFAULT_CANDIDATES, RenderingType};
use std::{env, fs, path::Path};
use thiserror::Error;
use url::Url;

pub const BASE_URL_ENV: &str = "SSVIEW_BASE_URL";

lazy_static! {
    static ref DEFAULT_BASE: Url = Url::parse(DEFAULT_BASE_URL).expect("valid default base URL");
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config '{path}': {message}")]
    Read { path: String, message: String },
    #[error("Could not parse config '{path}': {message}")]
    Parse { path: String, message: String },
    #[error("SSVIEW_BASE_URL is not a valid URL ('{value}'): {message}")]
    BaseUrl { value: String, message: String },
    #[error("Base URL '{0}' cannot carry a path")]
    UnusableBase(String),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error("Candidate list must not be empty")]
    NoCandidates,
    #[error("Minimum diagram size must be positive (got {width}x{height})")]
    MinimumSize { width: f64, height: f64 },
    #[error("Zoom range is invalid (min {min}, max {max}, step {step})")]
    ZoomRange { min: f64, max: f64, step: f64 },
    #[error("Magnifier radius and zoom must be positive (got radius {radius}, zoom {zoom})")]
    Magnifier { radius: f64, zoom: f64 },
}

fn default_candidates() -> Vec<RenderingType> {
    DEFAULT_CANDIDATES.to_vec()
}

fn default_base_url() -> Url {
    DEFAULT_BASE.clone()
}

fn default_true() -> bool {
    true
}

fn base_url_override() -> Option<Result<Url, ConfigError>> {
    let value = env::var(BASE_URL_ENV).ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(Url::parse(value).map_err(|e| ConfigError::BaseUrl {
        value: value.to_string(),
        message: e.to_string(),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub entity: String,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<RenderingType>,
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default = "default_true")]
    pub show_comparison: bool,
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_true")]
    pub show_description: bool,
    #[serde(default = "default_true")]
    pub show_editor_launch: bool,
    #[serde(default)]
    pub viewport: ViewportSettings,
    #[serde(default)]
    pub magnifier: MagnifierSettings,
}

impl WidgetConfig {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            candidates: default_candidates(),
            base_url: default_base_url(),
            show_comparison: true,
            show_legend: true,
            show_description: true,
            show_editor_launch: true,
            viewport: ViewportSettings::default(),
            magnifier: MagnifierSettings::default(),
        }
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Applies `SSVIEW_BASE_URL` over whatever the file or defaults said.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(url) = base_url_override() {
            self.base_url = url?;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn entity_ref(&self) -> Result<EntityRef, ConfigError> {
        Ok(EntityRef::new(&self.entity)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.entity_ref()?;
        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::UnusableBase(self.base_url.to_string()));
        }
        let ViewportSettings {
            min_width,
            min_height,
            min_zoom,
            max_zoom,
            zoom_step,
        } = self.viewport;
        if !(min_width > 0.0 && min_height > 0.0) {
            return Err(ConfigError::MinimumSize {
                width: min_width,
                height: min_height,
            });
        }
        if !(min_zoom > 0.0 && min_zoom <= 1.0 && max_zoom >= 1.0 && zoom_step > 1.0) {
            return Err(ConfigError::ZoomRange {
                min: min_zoom,
                max: max_zoom,
                step: zoom_step,
            });
        }
        let MagnifierSettings { lens_radius, zoom } = self.magnifier;
        if !(lens_radius > 0.0 && zoom > 0.0) {
            return Err(ConfigError::Magnifier {
                radius: lens_radius,
                zoom,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fills_defaults_for_missing_fields() {
        let config = WidgetConfig::from_json(r#"{"entity": "RF00005"}"#, "inline").expect("config");
        assert_eq!(config.candidates, DEFAULT_CANDIDATES.to_vec());
        assert!(config.show_comparison && config.show_legend && config.show_description);
        assert_eq!(config.viewport, ViewportSettings::default());
        assert_eq!(config.magnifier.lens_radius, 75.0);
    }

    #[test]
    fn reads_slugs_and_nested_settings() {
        let config = WidgetConfig::from_json(
            r#"{
                "entity": "RF00162",
                "candidates": ["cov", "rchie"],
                "base_url": "https://mirror.example.org/rfam/family/",
                "show_comparison": false,
                "viewport": {"min_width": 320},
                "magnifier": {"zoom": 3}
            }"#,
            "inline",
        )
        .expect("config");
        assert_eq!(
            config.candidates,
            vec![RenderingType::Covariation, RenderingType::ArcDiagram]
        );
        assert_eq!(config.base_url.host_str(), Some("mirror.example.org"));
        assert!(!config.show_comparison);
        assert_eq!(config.viewport.min_width, 320.0);
        assert_eq!(config.viewport.min_height, 500.0);
        assert_eq!(config.magnifier.zoom, 3.0);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            WidgetConfig::from_json(r#"{"entity": "  "}"#, "inline"),
            Err(ConfigError::Entity(EntityError::Empty))
        ));
        assert!(matches!(
            WidgetConfig::from_json(r#"{"entity": "RF1", "candidates": []}"#, "inline"),
            Err(ConfigError::NoCandidates)
        ));
        assert!(matches!(
            WidgetConfig::from_json(
                r#"{"entity": "RF1", "viewport": {"min_height": 0}}"#,
                "inline"
            ),
            Err(ConfigError::MinimumSize { .. })
        ));
        assert!(matches!(
            WidgetConfig::from_json(
                r#"{"entity": "RF1", "base_url": "mailto:rfam@example.org"}"#,
                "inline"
            ),
            Err(ConfigError::UnusableBase(_))
        ));
        assert!(matches!(
            WidgetConfig::from_json(r#"{"entity": "RF1", "magnifier": {"zoom": 0}}"#, "inline"),
            Err(ConfigError::Magnifier { .. })
        ));
        assert!(matches!(
            WidgetConfig::from_json(
                r#"{"entity": "RF1", "magnifier": {"lens_radius": -5}}"#,
                "inline"
            ),
            Err(ConfigError::Magnifier { .. })
        ));
        assert!(matches!(
            WidgetConfig::from_json(r#"{"entity": "RF1", "candidates": ["pdb"]}"#, "inline"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn loads_from_file_and_names_the_path_on_failure() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"entity": "RF00005", "show_legend": false}}"#).expect("write");
        let config = WidgetConfig::load_from_path(file.path()).expect("config");
        assert_eq!(config.entity, "RF00005");
        assert!(!config.show_legend);

        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.json");
        let err = WidgetConfig::load_from_path(&missing).expect_err("missing file");
        assert!(err.to_string().contains("missing.json"));
    }
}
