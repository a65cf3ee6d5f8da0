use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::catalog::Catalog;
use crate::engine::transition::Policy;

pub const MAX_WRITE_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_allow_rescoring")]
    pub allow_rescoring: bool,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// TOML catalog replacing the built-in levels, badges and missions.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

fn default_allow_rescoring() -> bool {
    true
}
fn default_max_write_attempts() -> u32 {
    5
}
fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campione")
        .join("learners")
        .to_string_lossy()
        .to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_rescoring: default_allow_rescoring(),
            max_write_attempts: default_max_write_attempts(),
            data_dir: default_data_dir(),
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Config::default()
        };
        config.validate();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("campione")
            .join("config.toml")
    }

    /// Clamp out-of-range values left by hand-edited files.
    pub fn validate(&mut self) {
        let clamped = self.max_write_attempts.clamp(1, MAX_WRITE_ATTEMPTS);
        if clamped != self.max_write_attempts {
            log::warn!(
                "max_write_attempts {} out of range, using {clamped}",
                self.max_write_attempts
            );
            self.max_write_attempts = clamped;
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self
            .catalog_path
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            self.catalog_path = None;
        }
    }

    pub fn policy(&self) -> Policy {
        Policy {
            allow_rescoring: self.allow_rescoring,
            max_attempts: self.max_write_attempts,
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => {
                let catalog = Catalog::load(Path::new(path))
                    .with_context(|| format!("loading catalog {path}"))?;
                log::info!(
                    "loaded catalog {path}: {} levels, {} badges, {} missions",
                    catalog.levels.levels().len(),
                    catalog.badges.len(),
                    catalog.missions.len()
                );
                Ok(catalog)
            }
            None => Ok(Catalog::default()),
        }
    }
}
