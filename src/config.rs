use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::drive::DEFAULT_API_BASE;

pub const TOKEN_ENV: &str = "DRIVETREE_ACCESS_TOKEN";

pub const CONFIG_DIR_ENV: &str = "DRIVETREE_CONFIG_DIR";

/// `$DRIVETREE_CONFIG_DIR`, else the platform config home joined with `drivetree`
pub fn config_dir() -> PathBuf {
    let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
    if let Some(dir) = var(CONFIG_DIR_ENV) {
        return dir;
    }
    let home = if cfg!(windows) { var("APPDATA") } else { None };
    home.or_else(|| var("XDG_CONFIG_HOME"))
        .or_else(|| var("HOME").map(|h| h.join(".config")))
        .map(|base| base.join("drivetree"))
        .unwrap_or_else(|| PathBuf::from(".drivetree"))
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_base: String,
    pub page_size: u32,            // clamped to 1..=1000 by the client
    pub request_timeout_secs: u64,
    pub access_token_file: Option<PathBuf>,
    pub max_depth: Option<usize>,  // unset = unbounded
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: 100,
            request_timeout_secs: 60,
            access_token_file: None,
            max_depth: None,
            log_file: None,
        }
    }
}

/// Load settings from `path`, or the default location when `None`.
/// A missing default file yields defaults; an explicit path must exist.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (p, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path(), false),
    };
    match std::fs::read_to_string(&p) {
        Ok(data) => {
            let s: Settings = toml::from_str(&data)
                .with_context(|| format!("Failed to parse config {}", p.display()))?;
            Ok(s)
        }
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read config {}", p.display())),
    }
}

impl Settings {
    /// Write as TOML through a temp file in the target directory, then rename.
    /// The file may name a token file, so it is created owner-only on unix.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        let data = toml::to_string_pretty(self)?;

        let tmp = tempfile::Builder::new()
            .prefix(".drivetree-config")
            .tempfile_in(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::write(tmp.path(), data)?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}

/// Resolve the bearer token: explicit value, then environment, then token file
pub fn resolve_access_token(explicit: Option<&str>, token_file: Option<&Path>) -> Result<String> {
    if let Some(t) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(t.to_string());
    }
    if let Ok(t) = std::env::var(TOKEN_ENV) {
        let t = t.trim();
        if !t.is_empty() {
            return Ok(t.to_string());
        }
    }
    if let Some(p) = token_file {
        let data = std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read token file {}", p.display()))?;
        let t = data.trim();
        if t.is_empty() {
            anyhow::bail!("Token file {} is empty", p.display());
        }
        return Ok(t.to_string());
    }
    anyhow::bail!(
        "No access token: pass --access-token, set {}, or configure access_token_file",
        TOKEN_ENV
    )
}
