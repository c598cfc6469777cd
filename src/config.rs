//! YAML session configuration. Every field is optional; command-line flags
//! are applied on top before validation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::export::default_export_dir;
use crate::shaders::ShaderBank;

pub const DEFAULT_COLUMNS: usize = 72;
pub const DEFAULT_ROWS: usize = 38;
pub const DEFAULT_FPS: u32 = 15;
pub const DEFAULT_CELL_WIDTH: u32 = 8;
pub const DEFAULT_CELL_HEIGHT: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default = "default_shader")]
    pub shader: String,
    #[serde(default)]
    pub flip: bool,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default = "default_rows")]
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Output directory; `~` expands to the home directory. Defaults to
    /// `<Pictures>/Poorlaroid`.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub cell: CellSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellSize {
    #[serde(default = "default_cell_width")]
    pub width: u32,
    #[serde(default = "default_cell_height")]
    pub height: u32,
}

fn default_shader() -> String {
    "retro".to_owned()
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_columns() -> usize {
    DEFAULT_COLUMNS
}

fn default_rows() -> usize {
    DEFAULT_ROWS
}

fn default_cell_width() -> u32 {
    DEFAULT_CELL_WIDTH
}

fn default_cell_height() -> u32 {
    DEFAULT_CELL_HEIGHT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            shader: default_shader(),
            flip: false,
            fps: DEFAULT_FPS,
            export: ExportConfig::default(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
        }
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CELL_WIDTH,
            height: DEFAULT_CELL_HEIGHT,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.columns == 0 || self.grid.rows == 0 {
            return Err(ConfigError::EmptyGrid {
                columns: self.grid.columns,
                rows: self.grid.rows,
            });
        }
        if self.fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        let cell = self.export.cell;
        if cell.width == 0 || cell.height == 0 {
            return Err(ConfigError::EmptyExportCell {
                width: cell.width,
                height: cell.height,
            });
        }
        let bank = ShaderBank::standard();
        if bank.find(&self.shader).is_none() {
            return Err(ConfigError::UnknownShader {
                name: self.shader.clone(),
                available: bank.names().join(", "),
            });
        }
        Ok(())
    }

    /// Directory captures are written to, with `~` expanded.
    pub fn export_dir(&self) -> Result<PathBuf> {
        match self.export.dir.as_deref() {
            Some(dir) => Ok(expand_path(dir, dirs::home_dir().as_deref())),
            None => default_export_dir()
                .ok_or_else(|| anyhow!("no pictures or home directory; set export.dir")),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<Config> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("failed to parse yaml at {}: {}", location, error)
    })
}

/// Expands a leading `~` to `home`; other paths pass through.
pub fn expand_path(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{expand_path, load_config, parse_config, Config};
    use crate::error::ConfigError;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").expect("empty config");
        assert_eq!(config, Config::default());
        assert_eq!((config.grid.columns, config.grid.rows), (72, 38));
        assert_eq!(config.fps, 15);
        assert_eq!(config.export.cell.width, 8);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = parse_config("grid:\n  columns: 40\nshader: Noire\nflip: true\n")
            .expect("partial config");
        assert_eq!(config.grid.columns, 40);
        assert_eq!(config.grid.rows, 38);
        assert_eq!(config.shader, "Noire");
        assert!(config.flip);
        config.validate().expect("valid");
    }

    #[test]
    fn unknown_keys_are_rejected_with_location() {
        let error = parse_config("grid:\n  colums: 40\n").expect_err("typo should fail");
        let message = error.to_string();
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("colums"), "{message}");
    }

    #[test]
    fn validation_catches_each_bad_value() {
        let mut config = Config::default();
        config.grid.rows = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyGrid {
                columns: 72,
                rows: 0
            })
        );

        let mut config = Config::default();
        config.fps = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroFps));

        let mut config = Config::default();
        config.export.cell.height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyExportCell { .. })
        ));

        let mut config = Config::default();
        config.shader = "sepia".to_owned();
        match config.validate() {
            Err(ConfigError::UnknownShader { name, available }) => {
                assert_eq!(name, "sepia");
                assert!(available.contains("Microwaavee"));
            }
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn tilde_expands_against_home() {
        let home = Path::new("/home/ana");
        assert_eq!(expand_path("~", Some(home)), PathBuf::from("/home/ana"));
        assert_eq!(
            expand_path("~/Pictures/out", Some(home)),
            PathBuf::from("/home/ana/Pictures/out")
        );
        assert_eq!(expand_path("~bob/x", Some(home)), PathBuf::from("~bob/x"));
        assert_eq!(expand_path("/tmp/x", Some(home)), PathBuf::from("/tmp/x"));
        assert_eq!(expand_path("~/x", None), PathBuf::from("~/x"));
    }

    #[test]
    fn explicit_export_dir_wins() {
        let mut config = Config::default();
        config.export.dir = Some("/srv/captures".to_owned());
        assert_eq!(
            config.export_dir().expect("export dir"),
            PathBuf::from("/srv/captures")
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let error = load_config(&temp.path().join("absent.yaml")).expect_err("missing file");
        assert!(error.to_string().contains("failed to read config"));
    }
}
