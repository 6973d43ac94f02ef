use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use self::retry::RetryPolicy;

pub mod cli;
pub mod container;
pub mod mysql;
pub mod naming;
pub mod process;
pub mod retry;

pub const DEFAULT_DOCKER: &str = "docker";
pub const DEFAULT_ADMIN_USER: &str = "root";
pub const DEFAULT_ADMIN_PASSWORD: &str = "password";
pub const DEFAULT_IMAGE: &str = "mysql";
pub const DEFAULT_CONFIG_FILE: &str = "devdb.toml";

/// Values read from an optional `devdb.toml`. Every key may be omitted.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub docker: Option<String>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub image: Option<String>,
    pub retry_interval_ms: Option<u64>,
    pub retry_max_attempts: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<FileConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Couldn't parse config file {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagementConfig {
    pub docker: String,
    pub admin_user: String,
    pub admin_password: String,
    pub image: String,
    pub retry: RetryPolicy,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        ManagementConfig {
            docker: DEFAULT_DOCKER.to_string(),
            admin_user: DEFAULT_ADMIN_USER.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ManagementConfig {
    /// Defaults, then the config file, then `DEVDB_*` environment variables.
    ///
    /// The file is `$DEVDB_CONFIG` when set (and must exist), otherwise
    /// `devdb.toml` in the working directory if there is one.
    pub fn from_env() -> Result<ManagementConfig> {
        let file = match env::var_os("DEVDB_CONFIG") {
            Some(path) => Some(FileConfig::load(&PathBuf::from(path))?),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Some(FileConfig::load(path)?)
                } else {
                    None
                }
            }
        };
        let mut config = ManagementConfig::default();
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_env(|key| env::var(key).ok())?;
        debug!("Management config: {:?}", &config.redacted());
        Ok(config)
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(docker) = file.docker {
            self.docker = docker;
        }
        if let Some(user) = file.admin_user {
            self.admin_user = user;
        }
        if let Some(password) = file.admin_password {
            self.admin_password = password;
        }
        if let Some(image) = file.image {
            self.image = image;
        }
        if let Some(ms) = file.retry_interval_ms {
            self.retry.interval = Duration::from_millis(ms);
        }
        if file.retry_max_attempts.is_some() {
            self.retry.max_attempts = file.retry_max_attempts;
        }
    }

    /// Applies overrides from `lookup`, which stands in for the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(docker) = lookup("DEVDB_DOCKER") {
            self.docker = docker;
        }
        if let Some(user) = lookup("DEVDB_ADMIN_USER") {
            self.admin_user = user;
        }
        if let Some(password) = lookup("DEVDB_ADMIN_PASSWORD") {
            self.admin_password = password;
        }
        if let Some(image) = lookup("DEVDB_IMAGE") {
            self.image = image;
        }
        if let Some(ms) = lookup("DEVDB_RETRY_INTERVAL_MS") {
            let ms = ms
                .parse::<u64>()
                .with_context(|| format!("DEVDB_RETRY_INTERVAL_MS is not a number: {}", ms))?;
            self.retry.interval = Duration::from_millis(ms);
        }
        if let Some(max) = lookup("DEVDB_RETRY_MAX_ATTEMPTS") {
            let max = max
                .parse::<u32>()
                .with_context(|| format!("DEVDB_RETRY_MAX_ATTEMPTS is not a number: {}", max))?;
            self.retry.max_attempts = Some(max);
        }
        Ok(())
    }

    fn redacted(&self) -> ManagementConfig {
        ManagementConfig {
            admin_password: "***".to_string(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_fixed_constants() {
        let config = ManagementConfig::default();
        assert_eq!(config.docker, "docker");
        assert_eq!(config.admin_user, "root");
        assert_eq!(config.admin_password, "password");
        assert_eq!(config.retry.interval, Duration::from_millis(100));
        assert_eq!(config.retry.max_attempts, None);
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "docker = \"podman\"\nadmin_password = \"from-file\"\nretry_interval_ms = 250"
        )?;
        let mut config = ManagementConfig::default();
        config.apply_file(FileConfig::load(file.path())?);
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEVDB_ADMIN_PASSWORD", "from-env"),
            ("DEVDB_RETRY_MAX_ATTEMPTS", "50"),
        ]);
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()))?;
        assert_eq!(config.docker, "podman");
        assert_eq!(config.admin_password, "from-env");
        assert_eq!(config.retry.interval, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, Some(50));
        Ok(())
    }

    #[test]
    fn rejects_bad_numbers() {
        let mut config = ManagementConfig::default();
        let result = config.apply_env(|key| {
            (key == "DEVDB_RETRY_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_file_keys() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "dokcer = \"podman\"")?;
        assert!(FileConfig::load(file.path()).is_err());
        Ok(())
    }
}
