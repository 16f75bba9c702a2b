use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::drag::{
    DEFAULT_AUTOSCROLL_MARGIN_PX, DEFAULT_AUTOSCROLL_STEP_PX, DEFAULT_DRAG_THRESHOLD_PX,
    DEFAULT_PROXY_ROTATION_DEG, DragConfig,
};

const APP_DIR: &str = "taskboard";
const DEFAULT_DEFAULT_VIEW: &str = "board";
const MIN_POLL_INTERVAL_MS: u64 = 500;
const MAX_POLL_INTERVAL_MS: u64 = 30_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const MIN_DRAG_THRESHOLD_PX: f64 = 1.0;
const MAX_DRAG_THRESHOLD_PX: f64 = 100.0;
const MAX_AUTOSCROLL_MARGIN_PX: f64 = 400.0;
const MIN_AUTOSCROLL_STEP_PX: f64 = 1.0;
const MAX_AUTOSCROLL_STEP_PX: f64 = 200.0;
const MIN_TIMELINE_DAYS: u32 = 1;
const MAX_TIMELINE_DAYS: u32 = 31;
const DEFAULT_TIMELINE_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Board owner. Generated and saved on first run.
    pub user_id: Option<Uuid>,
    pub database_path: Option<PathBuf>,
    pub default_view: String,
    pub poll_interval_ms: u64,
    pub drag_threshold_px: f64,
    pub autoscroll_margin_px: f64,
    pub autoscroll_step_px: f64,
    pub timeline_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_id: None,
            database_path: None,
            default_view: DEFAULT_DEFAULT_VIEW.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            autoscroll_margin_px: DEFAULT_AUTOSCROLL_MARGIN_PX,
            autoscroll_step_px: DEFAULT_AUTOSCROLL_STEP_PX,
            timeline_days: DEFAULT_TIMELINE_DAYS,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push(APP_DIR);
        path.push("settings.toml");
        Some(path)
    }

    pub fn default_database_path() -> Option<PathBuf> {
        let mut path = dirs::data_local_dir()?;
        path.push(APP_DIR);
        path.push("taskboard.sqlite");
        Some(path)
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from_path(&path)
    }

    fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read settings config");
                return Self::default();
            }
        };
        match toml::from_str::<Self>(&contents) {
            Ok(mut settings) => {
                settings.validate();
                settings
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse settings config");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("unable to determine config path"))?;
        self.save_to_path(&path)
    }

    fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("invalid settings config path"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory '{}'", parent.display()))?;

        let mut validated = self.clone();
        validated.validate();
        let contents =
            toml::to_string_pretty(&validated).context("failed to serialize settings to TOML")?;

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, contents).with_context(|| {
            format!(
                "failed to write temporary settings file '{}'",
                tmp_path.display()
            )
        })?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to move settings file '{}' into place",
                path.display()
            )
        })?;

        Ok(())
    }

    /// Owner id, creating and saving one when the config has none yet.
    pub fn ensure_user_id(&mut self) -> anyhow::Result<Uuid> {
        if let Some(user_id) = self.user_id {
            return Ok(user_id);
        }
        let user_id = Uuid::new_v4();
        self.user_id = Some(user_id);
        self.save().context("failed to persist generated user id")?;
        Ok(user_id)
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(Self::default_database_path)
    }

    pub fn starts_in_timeline(&self) -> bool {
        self.default_view == "timeline"
    }

    pub fn drag_config(&self) -> DragConfig {
        DragConfig {
            threshold_px: self.drag_threshold_px,
            autoscroll_margin_px: self.autoscroll_margin_px,
            autoscroll_step_px: self.autoscroll_step_px,
            proxy_rotation_deg: DEFAULT_PROXY_ROTATION_DEG,
        }
    }

    fn validate(&mut self) {
        self.poll_interval_ms = self
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        self.drag_threshold_px = clamp_px(
            self.drag_threshold_px,
            MIN_DRAG_THRESHOLD_PX,
            MAX_DRAG_THRESHOLD_PX,
            DEFAULT_DRAG_THRESHOLD_PX,
        );
        self.autoscroll_margin_px = clamp_px(
            self.autoscroll_margin_px,
            0.0,
            MAX_AUTOSCROLL_MARGIN_PX,
            DEFAULT_AUTOSCROLL_MARGIN_PX,
        );
        self.autoscroll_step_px = clamp_px(
            self.autoscroll_step_px,
            MIN_AUTOSCROLL_STEP_PX,
            MAX_AUTOSCROLL_STEP_PX,
            DEFAULT_AUTOSCROLL_STEP_PX,
        );
        self.timeline_days = self
            .timeline_days
            .clamp(MIN_TIMELINE_DAYS, MAX_TIMELINE_DAYS);

        self.default_view = match self.default_view.trim().to_ascii_lowercase().as_str() {
            "board" | "kanban" => "board".to_string(),
            "timeline" => "timeline".to_string(),
            _ => {
                warn!(
                    "invalid default_view '{}' in settings config; falling back to {}",
                    self.default_view, DEFAULT_DEFAULT_VIEW
                );
                DEFAULT_DEFAULT_VIEW.to_string()
            }
        };
    }
}

fn clamp_px(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_file_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join(APP_DIR).join("settings.toml")
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.user_id, None);
        assert_eq!(settings.default_view, "board");
        assert_eq!(settings.poll_interval_ms, 1_000);
        assert_eq!(settings.timeline_days, 7);
        assert_eq!(settings.drag_config(), DragConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let settings = Settings::load_from_path(&settings_file_path(&temp_dir));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_malformed_toml() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = settings_file_path(&temp_dir);
        fs::create_dir_all(path.parent().expect("settings path should have parent"))
            .expect("failed to create config dir");
        fs::write(&path, "timeline_days = [oops").expect("failed to write malformed settings");

        assert_eq!(Settings::load_from_path(&path), Settings::default());
    }

    #[test]
    fn test_load_partial_toml() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = settings_file_path(&temp_dir);
        fs::create_dir_all(path.parent().expect("settings path should have parent"))
            .expect("failed to create config dir");
        fs::write(&path, "default_view = \"timeline\"\ntimeline_days = 14")
            .expect("failed to write partial settings");

        let settings = Settings::load_from_path(&path);
        assert!(settings.starts_in_timeline());
        assert_eq!(settings.timeline_days, 14);
        assert_eq!(settings.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(settings.drag_threshold_px, DEFAULT_DRAG_THRESHOLD_PX);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = settings_file_path(&temp_dir);
        let expected = Settings {
            user_id: Some(Uuid::new_v4()),
            database_path: Some(PathBuf::from("/tmp/board.sqlite")),
            default_view: "timeline".to_string(),
            poll_interval_ms: 2_500,
            drag_threshold_px: 6.0,
            autoscroll_margin_px: 40.0,
            autoscroll_step_px: 20.0,
            timeline_days: 10,
        };

        expected
            .save_to_path(&path)
            .expect("failed to save settings for roundtrip test");
        assert_eq!(Settings::load_from_path(&path), expected);
    }

    #[test]
    fn test_validate_clamps_values() {
        let mut settings = Settings {
            poll_interval_ms: 1,
            drag_threshold_px: f64::NAN,
            autoscroll_margin_px: -5.0,
            autoscroll_step_px: 10_000.0,
            timeline_days: 0,
            ..Settings::default()
        };

        settings.validate();

        assert_eq!(settings.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert_eq!(settings.drag_threshold_px, DEFAULT_DRAG_THRESHOLD_PX);
        assert_eq!(settings.autoscroll_margin_px, 0.0);
        assert_eq!(settings.autoscroll_step_px, MAX_AUTOSCROLL_STEP_PX);
        assert_eq!(settings.timeline_days, MIN_TIMELINE_DAYS);
    }

    #[test]
    fn test_validate_default_view() {
        let mut settings = Settings {
            default_view: "Kanban".to_string(),
            ..Settings::default()
        };
        settings.validate();
        assert_eq!(settings.default_view, "board");

        settings.default_view = "gallery".to_string();
        settings.validate();
        assert_eq!(settings.default_view, "board");
    }

    #[test]
    fn test_database_path_override_wins() {
        let settings = Settings {
            database_path: Some(PathBuf::from("/data/custom.sqlite")),
            ..Settings::default()
        };
        assert_eq!(
            settings.database_path(),
            Some(PathBuf::from("/data/custom.sqlite"))
        );
    }
}
