//! Settings for the `bf` binary.
//!
//! Values resolve as: command-line flag, then environment, then the TOML
//! config file, then built-in defaults. The file lives at `$BF_CONFIG` or, if
//! that is unset, `bf.toml` under the XDG config home:
//!
//! ```toml
//! [engine]
//! memory_size = 30000
//! on_fault = "diagnostic"   # or "report"
//! timeout_ms = 5000         # `bf run` only; unset means no limit
//!
//! [colors]
//! bracket = "#cba6f7"
//! comment = "dark_gray"
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cross_xdg::BaseDirs;
use nu_ansi_term::Color;
use serde::Deserialize;

use crate::{DEFAULT_MEMORY, FaultPolicy, MIN_MEMORY};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    engine: EngineSection,
    #[serde(default)]
    colors: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    memory_size: Option<usize>,
    on_fault: Option<String>,
    timeout_ms: Option<u64>,
}

/// Highlighter colours for the REPL editor, one per instruction group.
#[derive(Debug, Clone, PartialEq)]
pub struct Colors {
    pub right: Color,
    pub left: Color,
    pub increment: Color,
    pub decrement: Color,
    pub output: Color,
    pub input: Color,
    pub bracket: Color,
    pub comment: Color,
}

impl Default for Colors {
    fn default() -> Self {
        // Catppuccin Mocha accents
        Self {
            right: Color::Rgb(137, 220, 235),
            left: Color::Rgb(148, 226, 213),
            increment: Color::Rgb(166, 227, 161),
            decrement: Color::Rgb(243, 139, 168),
            output: Color::Rgb(249, 226, 175),
            input: Color::Rgb(250, 179, 135),
            bracket: Color::Rgb(203, 166, 247),
            comment: Color::Rgb(108, 112, 134),
        }
    }
}

impl Colors {
    pub fn for_char(&self, ch: char) -> Color {
        match ch {
            '>' => self.right,
            '<' => self.left,
            '+' => self.increment,
            '-' => self.decrement,
            '.' => self.output,
            ',' => self.input,
            '[' | ']' => self.bracket,
            _ => self.comment,
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub memory_size: usize,
    pub on_fault: FaultPolicy,
    /// Wall-clock limit for `bf run`. `None` waits forever.
    pub timeout_ms: Option<u64>,
    pub colors: Colors,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY,
            on_fault: FaultPolicy::default(),
            timeout_ms: None,
            colors: Colors::default(),
        }
    }
}

impl Settings {
    /// Parse the contents of a config file. `path` is only used in errors.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut settings = Settings::default();
        if let Some(size) = file.engine.memory_size {
            settings.memory_size = size.max(MIN_MEMORY);
        }
        if let Some(policy) = file.engine.on_fault {
            settings.on_fault = parse_policy("engine.on_fault", &policy)?;
        }
        if let Some(ms) = file.engine.timeout_ms {
            settings.timeout_ms = Some(ms);
        }

        macro_rules! set {
            ($field:ident) => {
                if let Some(value) = file.colors.get(stringify!($field)) {
                    settings.colors.$field = parse_color(value).ok_or_else(|| ConfigError::Invalid {
                        key: concat!("colors.", stringify!($field)).to_string(),
                        message: format!("unknown color '{value}'"),
                    })?;
                }
            };
        }

        set!(right);
        set!(left);
        set!(increment);
        set!(decrement);
        set!(output);
        set!(input);
        set!(bracket);
        set!(comment);

        Ok(settings)
    }

    /// Apply `BF_MEMORY`, `BF_ON_FAULT` and `BF_TIMEOUT_MS` as looked up through `var`.
    pub fn with_env_overrides<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = var("BF_MEMORY") {
            let size = raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                key: "BF_MEMORY".to_string(),
                message: e.to_string(),
            })?;
            self.memory_size = size.max(MIN_MEMORY);
        }
        if let Some(raw) = var("BF_ON_FAULT") {
            self.on_fault = parse_policy("BF_ON_FAULT", &raw)?;
        }
        if let Some(raw) = var("BF_TIMEOUT_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "BF_TIMEOUT_MS".to_string(),
                message: e.to_string(),
            })?;
            self.timeout_ms = Some(ms);
        }
        Ok(self)
    }
}

fn parse_policy(key: &str, value: &str) -> Result<FaultPolicy, ConfigError> {
    value.parse().map_err(|message| ConfigError::Invalid {
        key: key.to_string(),
        message,
    })
}

/// Where the config file is expected, if a location can be determined at all.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("BF_CONFIG") {
        return Some(PathBuf::from(explicit));
    }

    // On Linux: /home/<user>/.config, on macOS: /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("bf.toml");
    Some(path)
}

/// Load settings from the config file (if any) and the environment.
pub fn load() -> Result<Settings, ConfigError> {
    let settings = match config_path() {
        Some(path) if path.exists() => {
            log::debug!("loading config from {}", path.display());
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            Settings::from_toml(&content, &path)?
        }
        _ => Settings::default(),
    };

    settings.with_env_overrides(|key| std::env::var(key).ok())
}

fn parse_color(value: &str) -> Option<Color> {
    let s = value.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?));
    }

    let name = s.to_ascii_lowercase().replace(['_', '-'], "");
    Some(match name.as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" | "purple" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" | "lightgray" | "lightgrey" => Color::LightGray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" | "lightpurple" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        _ => return None,
    })
}
