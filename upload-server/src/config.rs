use crate::error::AppError;
use crate::storage::DiskStorage;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_UPLOAD_ROOT: &str = "uploads";
const DEFAULT_PUBLIC_DIR: &str = "public";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_root: PathBuf,
    pub public_dir: PathBuf,
    pub public_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("PORT must be a port number: {}", e)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            upload_root: var("UPLOAD_ROOT")
                .unwrap_or_else(|| DEFAULT_UPLOAD_ROOT.to_string())
                .into(),
            public_dir: var("PUBLIC_DIR")
                .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string())
                .into(),
            public_base_url: var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid listen address: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub storage: DiskStorage,
    pub public_base_url: Option<String>,
    pub port: u16,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            storage: DiskStorage::new(config.upload_root.clone()),
            public_base_url: config.public_base_url.clone(),
            port: config.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.upload_root, PathBuf::from("uploads"));
        assert_eq!(config.public_dir, PathBuf::from("public"));
        assert!(config.public_base_url.is_none());
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("UPLOAD_ROOT", "/srv/file-uploads"),
            ("PUBLIC_BASE_URL", "https://cdn.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_root, PathBuf::from("/srv/file-uploads"));
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://cdn.example.com")
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(AppError::Config(_))
        ));
    }
}
