// config.rs — viewer configuration: JSON file, then CLI flags and environment
//
// Precedence (later wins):
// - built-in defaults
// - --config <path> (JSON, every field optional)
// - PANORAMA_VR_LANG
// - CLI flags: --projection --hint --image --stereo --mono --lang

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builder::FLAT_SCREEN_DISTANCE;
use crate::error::ConfigError;
use crate::orientation::OrientationController;
use crate::projection::{DEFAULT_DETAIL, DEFAULT_RADIUS};
use crate::scene::ViewerSettings;

pub const LANG_ENV: &str = "PANORAMA_VR_LANG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Projection identifier applied at startup.
    pub projection: String,
    /// Metadata hint used when `projection` is `AUTO`.
    pub projection_hint: Option<String>,
    pub detail_level: u32,
    pub radius: f32,
    pub force_mono: bool,
    /// Extra gain on device sensor rotation.
    pub orientation_speed: f32,
    /// Orbit damping factor per 60 Hz tick, `None` for immediate response.
    pub orbit_damping: Option<f32>,
    pub flat_distance: f32,
    /// Vertical field of view, degrees.
    pub fov_y_deg: f32,
    /// Render both eyes side by side in the window.
    pub stereo_preview: bool,
    pub lang: String,
    pub image: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            projection: "360".to_string(),
            projection_hint: None,
            detail_level: DEFAULT_DETAIL,
            radius: DEFAULT_RADIUS,
            force_mono: false,
            orientation_speed: 0.0,
            orbit_damping: Some(0.15),
            flat_distance: FLAT_SCREEN_DISTANCE,
            fov_y_deg: 75.0,
            stereo_preview: false,
            lang: "en".to_string(),
            image: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Build from process arguments and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let lang = std::env::var(LANG_ENV).ok();
        Self::from_args(&args, lang.as_deref())
    }

    /// `args` excludes the program name.
    pub fn from_args(args: &[String], env_lang: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match flag_value(args, "--config")? {
            Some(path) => Self::load(Path::new(path))?,
            None => Self::default(),
        };

        if let Some(lang) = env_lang.map(str::trim).filter(|l| !l.is_empty()) {
            config.lang = lang.to_string();
        }

        let mut it = args.iter();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--projection" => config.projection = required(&mut it, arg)?,
                "--hint" => config.projection_hint = Some(required(&mut it, arg)?),
                "--image" => config.image = Some(PathBuf::from(required(&mut it, arg)?)),
                "--lang" => config.lang = required(&mut it, arg)?,
                "--config" => {
                    it.next();
                }
                "--stereo" => config.stereo_preview = true,
                "--mono" => config.force_mono = true,
                other if !other.starts_with("--") && config.image.is_none() => {
                    // bare path, as passed by "open with"
                    config.image = Some(PathBuf::from(other));
                }
                other => log::warn!("ignoring unknown argument `{other}`"),
            }
        }

        Ok(config)
    }

    pub fn settings(&self) -> ViewerSettings {
        ViewerSettings {
            detail_level: self.detail_level,
            radius: self.radius,
            stereo_display: self.stereo_preview,
            fov_y: self.fov_y_deg.to_radians(),
            flat_distance: self.flat_distance,
            projection_hint: self.projection_hint.clone(),
            ..ViewerSettings::default()
        }
    }

    pub fn orientation(&self) -> OrientationController {
        OrientationController::new(self.orientation_speed, self.orbit_damping)
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, ConfigError> {
    match args.iter().position(|a| a == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| ConfigError::MissingValue(flag.to_string())),
        None => Ok(None),
    }
}

fn required<'a>(it: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<String, ConfigError> {
    it.next()
        .cloned()
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json(r#"{ "projection": "EAC_LR", "force_mono": true }"#, "inline")
            .unwrap();
        assert_eq!(config.projection, "EAC_LR");
        assert!(config.force_mono);
        assert_eq!(config.detail_level, DEFAULT_DETAIL);
        assert_eq!(config.lang, "en");
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = ViewerConfig::from_json("{ projection: ", "broken.json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "broken.json"));
    }

    #[test]
    fn cli_flags_override_environment() {
        let config = ViewerConfig::from_args(
            &args(&["--projection", "180_TB", "--lang", "ja", "--mono", "pano.jpg"]),
            Some("fr"),
        )
        .unwrap();
        assert_eq!(config.projection, "180_TB");
        assert_eq!(config.lang, "ja");
        assert!(config.force_mono);
        assert_eq!(config.image, Some(PathBuf::from("pano.jpg")));
    }

    #[test]
    fn environment_sets_language() {
        let config = ViewerConfig::from_args(&[], Some("zh-Hans")).unwrap();
        assert_eq!(config.lang, "zh-Hans");
    }

    #[test]
    fn missing_flag_value_is_reported() {
        let err = ViewerConfig::from_args(&args(&["--hint"]), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue(ref f) if f == "--hint"));
    }

    #[test]
    fn settings_carry_config() {
        let config = ViewerConfig {
            stereo_preview: true,
            fov_y_deg: 90.0,
            projection_hint: Some("360_TB".into()),
            ..ViewerConfig::default()
        };
        let settings = config.settings();
        assert!(settings.stereo_display);
        assert!((settings.fov_y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(settings.projection_hint.as_deref(), Some("360_TB"));
    }
}
