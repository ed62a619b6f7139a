use clap::ValueEnum;
use msci_compiler::{CompilerError, GameVersion};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub env_name: String,
    /// JSON command catalog loaded on top of the built-in commands.
    #[serde(default)]
    pub syntax_file: Option<PathBuf>,
    #[serde(default)]
    pub game_version: GameVersion,
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        let env_name = env::var("MSC_ENV").unwrap_or_else(|_| String::from("default"));

        // Fall back to a catalog next to the working directory
        let local_syntax = Path::new("./data/syntax.json");
        let syntax_file = if local_syntax.is_file() {
            Some(local_syntax.to_path_buf())
        } else {
            None
        };

        Config {
            env_name,
            syntax_file,
            game_version: GameVersion::default(),
            debug: false,
        }
    }
}

impl Config {
    /// Reads the config file for the current environment, or the defaults when there is none,
    /// then applies `MSC_*` environment overrides.
    pub fn load() -> Result<Self, CompilerError> {
        let config_path = Self::get_config_path();
        let config = if config_path.exists() {
            Self::parse(&fs::read_to_string(&config_path)?)?
        } else {
            Config::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn parse(contents: &str) -> Result<Self, CompilerError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn save(&self) -> io::Result<()> {
        let config_path = Self::get_config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = env::var("MSC_SYNTAX_FILE") {
            self.syntax_file = Some(PathBuf::from(path));
        }
        if let Ok(version) = env::var("MSC_VERSION") {
            if let Some(version) = parse_version(&version) {
                self.game_version = version;
            }
        }
        if let Ok(debug) = env::var("MSC_DEBUG") {
            self.debug = matches!(debug.as_str(), "true" | "1");
        }
        self
    }

    pub fn get_config_path() -> PathBuf {
        let env_name = env::var("MSC_ENV").unwrap_or_else(|_| String::from("default"));
        let home = if cfg!(windows) {
            env::var("USERPROFILE")
        } else {
            env::var("HOME")
        };

        PathBuf::from(home.unwrap_or_else(|_| String::from(".")))
            .join(".msc")
            .join(&env_name)
            .join("config.json")
    }
}

/// Accepts `terran_conflict` as well as `terran-conflict`.
fn parse_version(value: &str) -> Option<GameVersion> {
    GameVersion::from_str(&value.replace('_', "-"), true).ok()
}
