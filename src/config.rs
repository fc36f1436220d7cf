use crate::error::{ProxyError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable overriding the upstream base URL.
pub const ENV_BASE_URL: &str = "GITHUB_API_URL";

const CONFIG_DIR_NAME: &str = "github-models-proxy";

#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Resolved from `api_key_env` at startup; never read from the file.
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "https://models.inference.ai.azure.com".to_string()
}

fn default_api_key_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the first config file found, or the defaults when there is none.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults and environment");
        Ok(Self::default())
    }

    /// Apply environment overrides and resolve the upstream credential.
    ///
    /// `lookup` stands in for `std::env::var` so callers decide where values
    /// come from. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = get(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| {
                ProxyError::config(format!("{ENV_PORT} must be a port number, got '{port}'"))
            })?;
        }

        if let Some(url) = get(ENV_BASE_URL) {
            self.upstream.base_url = url;
        }

        self.upstream.api_key = get(&self.upstream.api_key_env).map(SecretString::from);

        Ok(())
    }
}

impl UpstreamConfig {
    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Candidate config file locations, in the order they are tried.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(format!("{CONFIG_DIR_NAME}.toml"))];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join(CONFIG_DIR_NAME).join("config.toml"));
    }

    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        paths.push(home.join(".config").join(CONFIG_DIR_NAME).join("config.toml"));
        paths.push(home.join(format!(".{CONFIG_DIR_NAME}.toml")));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[upstream]
base_url = "http://localhost:9999/v1/"
api_key_env = "MY_TOKEN"
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upstream.base_url, "http://localhost:9999/v1/");
        assert_eq!(config.upstream.api_key_env, "MY_TOKEN");
        assert_eq!(config.upstream.timeout_secs, 300);
        assert!(!config.upstream.has_credential());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.base_url, "https://models.inference.ai.azure.com");
        assert_eq!(config.upstream.api_key_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ProxyConfig::find_and_load(Some(Path::new("/nonexistent/proxy.toml"))).unwrap_err();
        assert!(matches!(err, ProxyError::Config { .. }));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "port = \"not a number\"").unwrap();
        assert!(matches!(ProxyConfig::load(f.path()), Err(ProxyError::Toml(_))));
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = ProxyConfig::default();
        config
            .apply_env(env(&[
                ("PORT", "3000"),
                ("GITHUB_API_URL", "http://mock:1234"),
                ("GITHUB_TOKEN", "ghp_secret"),
            ]))
            .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.upstream.base_url, "http://mock:1234");
        let key = config.upstream.api_key.as_ref().unwrap();
        assert_eq!(key.expose_secret(), "ghp_secret");
        assert!(!format!("{config:?}").contains("ghp_secret"));
    }

    #[test]
    fn test_apply_env_respects_custom_key_variable() {
        let mut config = ProxyConfig::default();
        config.upstream.api_key_env = "OTHER_TOKEN".to_string();
        config
            .apply_env(env(&[("GITHUB_TOKEN", "wrong"), ("OTHER_TOKEN", "right")]))
            .unwrap();
        assert_eq!(config.upstream.api_key.as_ref().unwrap().expose_secret(), "right");
    }

    #[test]
    fn test_apply_env_empty_values_are_unset() {
        let mut config = ProxyConfig::default();
        config
            .apply_env(env(&[("PORT", ""), ("GITHUB_TOKEN", "  ")]))
            .unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.upstream.has_credential());
    }

    #[test]
    fn test_apply_env_rejects_bad_port() {
        let mut config = ProxyConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_completions_url() {
        let mut upstream = UpstreamConfig::default();
        assert_eq!(
            upstream.completions_url(),
            "https://models.inference.ai.azure.com/chat/completions"
        );
        upstream.base_url = "http://localhost:8000/v1/".to_string();
        assert_eq!(upstream.completions_url(), "http://localhost:8000/v1/chat/completions");
    }
}
