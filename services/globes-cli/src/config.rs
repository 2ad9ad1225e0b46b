//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! `GLOBES_API_URL` points every service at one gateway, overriding the
//! per-service URLs from the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use api_client::AuthStyle;
use serde::Deserialize;
use travel_api::{ApiSettings, DEFAULT_API_URL};

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend addresses and transport settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub auth_url: String,
    pub profile_url: String,
    pub media_url: String,
    pub globes_url: String,
    pub likes_url: String,
    pub timeout_ms: u64,
    pub auth_style: AuthStyleName,
    pub cookie_name: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_API_URL.into(),
            profile_url: DEFAULT_API_URL.into(),
            media_url: DEFAULT_API_URL.into(),
            globes_url: DEFAULT_API_URL.into(),
            likes_url: DEFAULT_API_URL.into(),
            timeout_ms: 5000,
            auth_style: AuthStyleName::Bearer,
            cookie_name: auth_store::DEFAULT_COOKIE_NAME.into(),
        }
    }
}

/// How the access token is attached, as written in the TOML file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStyleName {
    #[default]
    Bearer,
    Cookie,
}

/// Local session storage
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credentials_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate TOML text. Empty input yields the defaults.
    pub fn parse(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if let Ok(url) = std::env::var("GLOBES_API_URL") {
            let api = &mut config.api;
            for field in [
                &mut api.auth_url,
                &mut api.profile_url,
                &mut api.media_url,
                &mut api.globes_url,
                &mut api.likes_url,
            ] {
                *field = url.clone();
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let api = &self.api;
        for (service, url) in [
            ("auth", &api.auth_url),
            ("profile", &api.profile_url),
            ("media", &api.media_url),
            ("globes", &api.globes_url),
            ("likes", &api.likes_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::InvalidUrl {
                    service,
                    url: url.clone(),
                });
            }
        }

        if api.timeout_ms == 0 {
            return Err(common::Error::Config(
                "timeout_ms must be greater than 0".into(),
            ));
        }

        if api.auth_style == AuthStyleName::Cookie
            && (api.cookie_name.is_empty()
                || api
                    .cookie_name
                    .chars()
                    .any(|c| c == '=' || c == ';' || c.is_whitespace()))
        {
            return Err(common::Error::Config(format!(
                "cookie_name {:?} is not a valid cookie name",
                api.cookie_name
            )));
        }

        Ok(())
    }

    /// Client settings for `TravelApi`.
    pub fn settings(&self) -> ApiSettings {
        let api = &self.api;
        ApiSettings {
            auth_url: api.auth_url.clone(),
            profile_url: api.profile_url.clone(),
            media_url: api.media_url.clone(),
            globes_url: api.globes_url.clone(),
            likes_url: api.likes_url.clone(),
            timeout: Duration::from_millis(api.timeout_ms),
            auth_style: match api.auth_style {
                AuthStyleName::Bearer => AuthStyle::Bearer,
                AuthStyleName::Cookie => AuthStyle::Cookie {
                    name: api.cookie_name.clone(),
                },
            },
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("globes.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that read or mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn full_toml() -> &'static str {
        r#"
[api]
auth_url = "https://auth.globes.example/"
profile_url = "https://profile.globes.example/"
media_url = "https://media.globes.example/"
globes_url = "https://albums.globes.example/"
likes_url = "https://likes.globes.example/"
timeout_ms = 2500
auth_style = "cookie"

[storage]
credentials_path = "/var/lib/globes/credentials.json"
"#
    }

    #[test]
    fn load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("GLOBES_API_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("globes.toml");
        std::fs::write(&path, full_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.media_url, "https://media.globes.example/");
        assert_eq!(config.api.timeout_ms, 2500);
        assert_eq!(config.api.auth_style, AuthStyleName::Cookie);
        assert_eq!(
            config.storage.credentials_path,
            PathBuf::from("/var/lib/globes/credentials.json")
        );

        let settings = config.settings();
        assert_eq!(settings.timeout, Duration::from_millis(2500));
        assert_eq!(settings.auth_style, AuthStyle::cookie());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("GLOBES_API_URL") };

        let config = Config::parse("").unwrap();
        assert_eq!(config.api.auth_url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.api.auth_style, AuthStyleName::Bearer);
        assert_eq!(config.api.cookie_name, "auth_token");
        assert_eq!(
            config.storage.credentials_path,
            PathBuf::from("credentials.json")
        );
        assert_eq!(config.settings(), ApiSettings::default());
    }

    #[test]
    fn gateway_env_overrides_every_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("GLOBES_API_URL", "http://gateway:8080/") };
        let config = Config::parse(full_toml());
        unsafe { remove_env("GLOBES_API_URL") };

        let config = config.unwrap();
        for url in [
            &config.api.auth_url,
            &config.api.profile_url,
            &config.api.media_url,
            &config.api.globes_url,
            &config.api.likes_url,
        ] {
            assert_eq!(url, "http://gateway:8080/");
        }
    }

    #[test]
    fn url_without_scheme_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("GLOBES_API_URL") };

        let err = Config::parse("[api]\nlikes_url = \"likes.globes.example\"\n").unwrap_err();
        assert!(
            matches!(err, common::Error::InvalidUrl { service: "likes", .. }),
            "got: {err}"
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("GLOBES_API_URL") };

        let err = Config::parse("[api]\ntimeout_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_ms"), "got: {err}");
    }

    #[test]
    fn bad_cookie_name_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("GLOBES_API_URL") };

        let result = Config::parse("[api]\nauth_style = \"cookie\"\ncookie_name = \"a=b\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_auth_style_rejected() {
        let result = Config::parse("[api]\nauth_style = \"basic\"\n");
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/globes.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/env/path.toml"));
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("globes.toml"));
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
    }
}
