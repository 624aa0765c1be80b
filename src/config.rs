use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub manifest_dir: Option<PathBuf>,
    pub skip_delete: bool,
}

impl AppConfig {
    /// Reads `explicit`, or the per-user config file if one exists. A missing
    /// per-user file is not an error; a missing explicit one is.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config =
            serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// Command line (or environment) wins over the config file, which wins
    /// over the launcher's default location.
    pub fn resolve_manifest_dir(&self, requested: Option<&Path>) -> Result<PathBuf> {
        requested
            .map(Path::to_path_buf)
            .or_else(|| self.manifest_dir.clone())
            .or_else(default_manifest_dir)
            .context("no manifest directory known for this platform; pass --manifest-dir")
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.config_dir().join("egs-mover").join("config.json"))
}

#[cfg(windows)]
pub fn default_manifest_dir() -> Option<PathBuf> {
    let program_data = std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"));
    Some(launcher_manifest_dir(&program_data))
}

#[cfg(target_os = "macos")]
pub fn default_manifest_dir() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(launcher_manifest_dir(base.data_dir()))
}

#[cfg(not(any(windows, target_os = "macos")))]
pub fn default_manifest_dir() -> Option<PathBuf> {
    None
}

#[cfg(any(windows, target_os = "macos"))]
fn launcher_manifest_dir(root: &Path) -> PathBuf {
    root.join("Epic")
        .join("EpicGamesLauncher")
        .join("Data")
        .join("Manifests")
}
