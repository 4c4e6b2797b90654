use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ip: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub file_directory: PathBuf,
    pub path_base: String,
    pub scheme: String,
    pub web_url: Option<String>,
    pub require_account_confirmation: bool,
    pub session_hours: i64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            database_path: PathBuf::from("./filehub.sqlite3"),
            file_directory: PathBuf::from("./files"),
            path_base: String::new(),
            scheme: "http".to_string(),
            web_url: None,
            require_account_confirmation: false,
            session_hours: 24 * 30,
            max_upload_bytes: 512 * 1024 * 1024, // 512MiB
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn account_settings(&self) -> storage::AccountSettings {
        storage::AccountSettings {
            require_account_confirmation: self.require_account_confirmation,
            session_hours: self.session_hours,
            ..storage::AccountSettings::default()
        }
    }
}

/// `/base` without a trailing slash, or an empty string for the root.
pub fn normalize_path_base(path_base: &str) -> String {
    let trimmed = path_base.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl From<Config> for api::Config {
    fn from(config: Config) -> Self {
        api::Config {
            ip: config.ip,
            port: config.port,
            path_base: normalize_path_base(&config.path_base),
            scheme: config.scheme,
            web_url: config.web_url,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_base() {
        assert_eq!(normalize_path_base(""), "");
        assert_eq!(normalize_path_base("/"), "");
        assert_eq!(normalize_path_base("hub"), "/hub");
        assert_eq!(normalize_path_base("/hub/"), "/hub");
        assert_eq!(normalize_path_base("/a/b"), "/a/b");
    }

    #[test]
    fn test_api_config_conversion() {
        let mut config = Config::new("0.0.0.0".parse().unwrap(), 9090);
        config.path_base = "hub/".to_string();
        config.web_url = Some("https://web.example.com".to_string());

        let api_config: api::Config = config.into();

        assert_eq!(api_config.bind_address(), "0.0.0.0:9090");
        assert_eq!(api_config.path_base, "/hub");
        assert_eq!(api_config.scheme, "http");
        assert_eq!(api_config.web_url.as_deref(), Some("https://web.example.com"));
    }

    #[test]
    fn test_account_settings() {
        let mut config = Config::new("127.0.0.1".parse().unwrap(), 8080);
        config.require_account_confirmation = true;
        config.session_hours = 2;

        let settings = config.account_settings();

        assert!(settings.require_account_confirmation);
        assert_eq!(settings.session_hours, 2);
        assert_eq!(settings.max_failed_logins, 5);
    }
}
