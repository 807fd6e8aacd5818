use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::gallery::FocusSettings;
use crate::masonry::MasonryStyle;

const SETTINGS_DIR_NAME: &str = "centerpiece";
const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub viewport: ViewportSettings,
    pub gallery: GallerySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub min_scale: f32,
    pub max_scale: f32,
    pub wheel_step: f32,
    pub pinch_step: f32,
    pub double_click_disabled: bool,
    pub double_click_step: f32,
    pub velocity_disabled: bool,
    pub limit_to_bounds: bool,
    /// Pan offset of the unscaled content on first render. Centered when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_position: Option<[f32; 2]>,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 5.0,
            wheel_step: 0.1,
            pinch_step: 5.0,
            double_click_disabled: true,
            double_click_step: 0.7,
            velocity_disabled: true,
            limit_to_bounds: true,
            initial_position: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GallerySettings {
    pub frame_width: f32,
    pub frame_height: f32,
    pub max_columns: usize,
    pub column_width: f32,
    pub column_gap: f32,
    pub card_margin: f32,
    pub content_width_fraction: f32,
    pub selected_padding: f32,
    pub selected_width_factor: f32,
    pub selected_max_width: f32,
    pub focus_scale: f32,
    pub focus_duration_ms: u64,
    pub card_transition_ms: u64,
    pub max_texture_dim: u32,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            frame_width: 800.0,
            frame_height: 600.0,
            max_columns: 5,
            column_width: 100.0,
            column_gap: 24.0,
            card_margin: 8.0,
            content_width_fraction: 0.9,
            selected_padding: 20.0,
            selected_width_factor: 1.5,
            selected_max_width: 400.0,
            focus_scale: 2.0,
            focus_duration_ms: 300,
            card_transition_ms: 300,
            max_texture_dim: 1024,
        }
    }
}

impl GallerySettings {
    pub fn focus(&self) -> FocusSettings {
        FocusSettings {
            scale: self.focus_scale,
            duration: Duration::from_millis(self.focus_duration_ms),
        }
    }

    pub fn masonry_style(&self) -> MasonryStyle {
        MasonryStyle {
            max_columns: self.max_columns,
            column_width: self.column_width,
            column_gap: self.column_gap,
            card_margin: self.card_margin,
            content_width_fraction: self.content_width_fraction,
            selected_padding: self.selected_padding,
            selected_width_factor: self.selected_width_factor,
            selected_max_width: self.selected_max_width,
        }
    }

    pub fn card_transition_secs(&self) -> f32 {
        self.card_transition_ms as f32 / 1000.0
    }
}

impl Settings {
    /// Repairs values that would break layout or zoom math.
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();

        let viewport = &mut self.viewport;
        if !(viewport.min_scale > 0.0) {
            viewport.min_scale = defaults.viewport.min_scale;
        }
        if !(viewport.max_scale > 0.0) {
            viewport.max_scale = defaults.viewport.max_scale;
        }
        if viewport.min_scale > viewport.max_scale {
            std::mem::swap(&mut viewport.min_scale, &mut viewport.max_scale);
        }
        if !(viewport.wheel_step > 0.0) {
            viewport.wheel_step = defaults.viewport.wheel_step;
        }
        if !(viewport.pinch_step > 0.0) {
            viewport.pinch_step = defaults.viewport.pinch_step;
        }
        if !(viewport.double_click_step > 0.0) {
            viewport.double_click_step = defaults.viewport.double_click_step;
        }
        if viewport
            .initial_position
            .is_some_and(|position| !position.iter().all(|value| value.is_finite()))
        {
            viewport.initial_position = None;
        }

        let gallery = &mut self.gallery;
        for (value, fallback) in [
            (&mut gallery.frame_width, defaults.gallery.frame_width),
            (&mut gallery.frame_height, defaults.gallery.frame_height),
            (&mut gallery.column_width, defaults.gallery.column_width),
            (&mut gallery.selected_width_factor, defaults.gallery.selected_width_factor),
            (&mut gallery.selected_max_width, defaults.gallery.selected_max_width),
            (&mut gallery.focus_scale, defaults.gallery.focus_scale),
        ] {
            if !(*value > 0.0) {
                *value = fallback;
            }
        }
        for value in [
            &mut gallery.column_gap,
            &mut gallery.card_margin,
            &mut gallery.selected_padding,
        ] {
            if !(*value >= 0.0) {
                *value = 0.0;
            }
        }
        if !(gallery.content_width_fraction > 0.0 && gallery.content_width_fraction <= 1.0) {
            gallery.content_width_fraction = defaults.gallery.content_width_fraction;
        }
        gallery.max_columns = gallery.max_columns.max(1);
        gallery.max_texture_dim = gallery.max_texture_dim.max(16);

        self
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn parse_settings(text: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(text).context("Invalid settings TOML")?;
    Ok(settings.sanitized())
}

/// Reads settings from `path`. The file must exist.
pub fn read_settings(path: &Path) -> Result<Settings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read settings file {}", path.display()))?;
    parse_settings_file(path, &text)
}

fn parse_settings_file(path: &Path, text: &str) -> Result<Settings> {
    parse_settings(text)
        .with_context(|| format!("Could not parse settings file {}", path.display()))
}

/// Resolves startup settings. A file named on the command line must exist;
/// the one in the config directory is optional.
fn resolve_settings(explicit: Option<&Path>, default_path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        let settings = read_settings(path)?;
        log::info!("settings loaded from {}", path.display());
        return Ok(settings);
    }

    let Some(path) = default_path else {
        return Ok(Settings::default());
    };
    match fs::read_to_string(path) {
        Ok(text) => {
            let settings = parse_settings_file(path, &text)?;
            log::info!("settings loaded from {}", path.display());
            Ok(settings)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::debug!("no settings file at {}, using defaults", path.display());
            Ok(Settings::default())
        }
        Err(err) => Err(err)
            .with_context(|| format!("Could not read settings file {}", path.display())),
    }
}

/// Loads settings for startup, degrading to defaults with a warning.
pub fn load_settings(explicit: Option<&Path>) -> Settings {
    let default_path = default_settings_path();
    resolve_settings(explicit, default_path.as_deref()).unwrap_or_else(|err| {
        log::warn!("{err:#}; using default settings");
        Settings::default()
    })
}

pub fn render_settings_toml(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).context("Could not serialize settings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_gallery_constants() {
        let settings = Settings::default();
        assert_eq!(settings.viewport.min_scale, 0.5);
        assert_eq!(settings.viewport.max_scale, 5.0);
        assert!(settings.viewport.double_click_disabled);
        assert!(settings.viewport.velocity_disabled);
        assert!(settings.viewport.limit_to_bounds);
        assert_eq!(settings.gallery.focus(), FocusSettings::default());
        assert_eq!(settings.gallery.max_columns, 5);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let settings = parse_settings(
            "[viewport]\nmax_scale = 8.0\ninitial_position = [-20.0, 15.5]\n\n[gallery]\nfocus_scale = 3.0\n",
        )
        .expect("settings should parse");

        assert_eq!(settings.viewport.max_scale, 8.0);
        assert_eq!(settings.viewport.min_scale, 0.5);
        assert_eq!(settings.viewport.initial_position, Some([-20.0, 15.5]));
        assert_eq!(settings.gallery.focus_scale, 3.0);
        assert_eq!(settings.gallery.column_width, 100.0);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings = parse_settings("theme = \"dark\"\n[viewport]\nspin = true\n")
            .expect("unknown keys should be ignored");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn sanitizing_repairs_inconsistent_values() {
        let settings = parse_settings(
            "[viewport]\nmin_scale = 6.0\nmax_scale = 2.0\nwheel_step = -1.0\n\n[gallery]\nmax_columns = 0\ncolumn_width = 0.0\ncontent_width_fraction = 1.5\ncolumn_gap = -3.0\n",
        )
        .expect("settings should parse");

        assert_eq!(settings.viewport.min_scale, 2.0);
        assert_eq!(settings.viewport.max_scale, 6.0);
        assert_eq!(settings.viewport.wheel_step, 0.1);
        assert_eq!(settings.gallery.max_columns, 1);
        assert_eq!(settings.gallery.column_width, 100.0);
        assert_eq!(settings.gallery.content_width_fraction, 0.9);
        assert_eq!(settings.gallery.column_gap, 0.0);
    }

    #[test]
    fn non_finite_initial_position_is_dropped() {
        let settings = parse_settings("[viewport]\ninitial_position = [nan, 10.0]\n")
            .expect("settings should parse");
        assert_eq!(settings.viewport.initial_position, None);

        let settings = parse_settings("[viewport]\ninitial_position = [5.0, -inf]\n")
            .expect("settings should parse");
        assert_eq!(settings.viewport.initial_position, None);
    }

    #[test]
    fn missing_config_dir_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let absent = dir.path().join("absent.toml");
        let settings = resolve_settings(None, Some(&absent)).expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(
            resolve_settings(None, None).expect("defaults"),
            Settings::default()
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let absent = dir.path().join("absent.toml");

        let err = resolve_settings(Some(&absent), None).expect_err("missing file");
        assert!(format!("{err:#}").contains("Could not read settings file"));
        assert!(read_settings(&absent).is_err());
        assert_eq!(load_settings(Some(&absent)), Settings::default());
    }

    #[test]
    fn explicit_file_wins_over_config_dir_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let explicit = dir.path().join("explicit.toml");
        let config_dir_file = dir.path().join("settings.toml");
        fs::write(&explicit, "[gallery]\nmax_columns = 3\n").expect("write settings");
        fs::write(&config_dir_file, "[gallery]\nmax_columns = 4\n").expect("write settings");

        let settings =
            resolve_settings(Some(&explicit), Some(&config_dir_file)).expect("explicit settings");
        assert_eq!(settings.gallery.max_columns, 3);
        let settings = resolve_settings(None, Some(&config_dir_file)).expect("config settings");
        assert_eq!(settings.gallery.max_columns, 4);
    }

    #[test]
    fn invalid_file_is_an_error_but_loads_as_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[viewport\nmin_scale = ").expect("write settings");

        assert!(read_settings(&path).is_err());
        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn rendered_settings_read_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.viewport.velocity_disabled = false;
        settings.gallery.frame_width = 1024.0;

        fs::write(&path, render_settings_toml(&settings).expect("render")).expect("write");

        assert_eq!(read_settings(&path).expect("read back"), settings);
    }
}
