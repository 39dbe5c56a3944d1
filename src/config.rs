use std::path::{Path, PathBuf};

use eyre::{WrapErr, bail};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::Result;

const CONFIG_FILES: [&str; 4] = [
    "lint-staged.toml",
    "lint-staged.yaml",
    "lint-staged.yml",
    "lint-staged.json",
];

/// Glob patterns mapped to the commands to run on matching staged files, in
/// declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub tasks: IndexMap<String, Commands>,
}

/// A single command or a list of commands run in sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Commands {
    Single(String),
    Multiple(Vec<String>),
}

impl Commands {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Commands::Single(command) => std::slice::from_ref(command),
            Commands::Multiple(commands) => commands,
        }
    }
}

impl Config {
    /// Load an explicitly given config file, or walk upward from `cwd`
    /// trying the well-known names in each directory.
    pub fn get(cwd: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        let mut dir = cwd.to_path_buf();
        loop {
            for name in CONFIG_FILES {
                let path = dir.join(name);
                if path.exists() {
                    return Self::read(&path);
                }
            }
            if !dir.pop() {
                break;
            }
        }
        bail!(
            "no lint-staged config file found in {} or any parent directory",
            cwd.display()
        );
    }

    pub fn read(path: &Path) -> Result<Self> {
        debug!("reading config file: {}", path.display());
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let ext = path.extension().unwrap_or_default().to_str().unwrap_or_default();
        let config = match ext {
            "toml" => toml::from_str(&raw)?,
            "yaml" | "yml" => serde_yaml::from_str(&raw)?,
            "json" => serde_json::from_str(&raw)?,
            _ => bail!("unsupported config file extension: {ext:?}"),
        };
        Ok(config)
    }
}
