use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_WEATHER_REPORT: &str =
    "The weather in Hyderabad is currently clear and sunny, with a temperature of 32 degrees Celsius.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub system_instruction: String,
    pub language: String,
    pub voice_pitch: f32,
    pub voice_rate: f32,
    pub synthesizer_command: String,
    pub recognizer_command: String,
    pub location: String,
    pub weather_report: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout_secs: 30,
            system_instruction: String::new(),
            language: "en-US".to_string(),
            voice_pitch: 1.0,
            voice_rate: 1.0,
            synthesizer_command: "espeak-ng".to_string(),
            recognizer_command: String::new(),
            location: "Hyderabad, IN".to_string(),
            weather_report: DEFAULT_WEATHER_REPORT.to_string(),
        }
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("jarvis");
        config_dir.join("config.toml")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing defaults there on first run.
    /// Environment fallbacks are applied after the defaults are saved so a
    /// key from the environment never ends up on disk.
    pub fn load_from(path: &Path) -> Self {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    fn load_with_env(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        return config.with_env_lookup(lookup);
                    }
                    Err(e) => {
                        log::warn!("Failed to parse config: {}. Using defaults.", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config: {}. Using defaults.", e);
                }
            }
            return Config::default().with_env_lookup(lookup);
        }

        let config = Config::default();
        if let Err(e) = config.save_to(path) {
            log::warn!("Failed to write default config: {}", e);
        }
        config.with_env_lookup(lookup)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Use env vars as fallback if config values are empty
    fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.gemini_api_key.is_empty() {
            if let Some(key) = lookup("GEMINI_API_KEY") {
                self.gemini_api_key = key;
            }
        }
        if let Some(lang) = lookup("JARVIS_LANGUAGE").filter(|l| !l.is_empty()) {
            self.language = lang;
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }

    pub fn effective_system_instruction(&self) -> Option<&str> {
        if self.system_instruction.trim().is_empty() {
            None
        } else {
            Some(&self.system_instruction)
        }
    }

    pub fn effective_recognizer_command(&self) -> Option<&str> {
        if self.recognizer_command.trim().is_empty() {
            None
        } else {
            Some(&self.recognizer_command)
        }
    }
}
