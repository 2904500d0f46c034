use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::info;

pub const DB_PATH_ENV: &str = "DIETLOG_DB_PATH";
pub const JWT_SECRET_ENV: &str = "DIETLOG_JWT_SECRET";
pub const CORS_ORIGINS_ENV: &str = "DIETLOG_CORS_ORIGINS";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "dietlog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = std::env::var_os(DB_PATH_ENV)
            .map_or_else(|| data_dir.join("dietlog.db"), PathBuf::from);

        Ok(Config { db_path, data_dir })
    }

    /// Token signing secret: the environment wins, otherwise a generated
    /// secret persisted in the data directory.
    pub fn jwt_secret(&self) -> Result<String> {
        match std::env::var(JWT_SECRET_ENV) {
            Ok(secret) if !secret.trim().is_empty() => Ok(secret),
            _ => load_or_create_secret(&self.data_dir.join("jwt_secret")),
        }
    }
}

/// Read the secret at `path`, or generate 32 random bytes as hex and store
/// them there readable by the owner only.
pub fn load_or_create_secret(path: &Path) -> Result<String> {
    use rand::Rng;
    use std::fmt::Write;

    if path.exists() {
        let secret = std::fs::read_to_string(path).context("Failed to read JWT secret file")?;
        let secret = secret.trim().to_string();
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let bytes: [u8; 32] = rand::rng().random();
    let secret = bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc: String, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        });
    std::fs::write(path, &secret).context("Failed to write JWT secret file")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to set JWT secret file permissions")?;
    }
    info!(path = %path.display(), "generated new JWT signing secret");
    Ok(secret)
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// Comma-separated origins; empty or `*` allows any.
    pub fn parse(raw: Option<&str>) -> Self {
        let origins: Vec<String> = raw
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(CORS_ORIGINS_ENV).ok().as_deref())
    }
}
