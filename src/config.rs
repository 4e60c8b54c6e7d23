use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

pub const APP_NAME: &str = "azabox";
pub const STATE_FILE_NAME: &str = "state.json";
pub const INSTALL_DIR_NAME: &str = ".azabox";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

pub const STATE_FILE_ENV: &str = "AZABOX_STATE_FILE";
pub const BIN_DIR_ENV: &str = "AZABOX_BIN_DIR";
pub const TMP_DIR_ENV: &str = "AZABOX_TMP_DIR";
pub const GITHUB_API_URL_ENV: &str = "AZABOX_GITHUB_API_URL";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const LOG_LEVEL_ENV: &str = "AZABOX_LOG_LEVEL";

/// Runtime locations and remote endpoints, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub state_file: PathBuf,
    pub bin_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub github_api_url: String,
    pub github_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Build settings from a variable lookup, falling back to per-user defaults.
    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let state_file = match var(STATE_FILE_ENV) {
            Some(path) => PathBuf::from(path),
            None => get_state_dir()?.join(STATE_FILE_NAME),
        };

        let bin_dir = match var(BIN_DIR_ENV) {
            Some(path) => PathBuf::from(path),
            None => get_default_bin_dir()?,
        };

        let tmp_dir = var(TMP_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let github_api_url = var(GITHUB_API_URL_ENV)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let settings = Settings {
            state_file,
            bin_dir,
            tmp_dir,
            github_api_url,
            github_token: var(GITHUB_TOKEN_ENV),
        };
        tracing::debug!("Resolved settings: {:?}", settings.redacted());
        Ok(settings)
    }

    fn redacted(&self) -> Self {
        Settings {
            github_token: self.github_token.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }
}

/// `<config_dir>/azabox`, created if missing.
pub fn get_state_dir() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine user config directory"))?
        .join(APP_NAME);
    fs::create_dir_all(&path)?;
    tracing::debug!("State directory: {}", path.display());
    Ok(path)
}

/// `~/.azabox/bin`. Not created here; the installer creates it on first use.
pub fn get_default_bin_dir() -> Result<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine user home directory"))?
        .join(INSTALL_DIR_NAME)
        .join("bin");
    Ok(path)
}
