use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5173;
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_FRONTEND_ROOT: &str = "frontend/dist";

/// Values found in a dotenv-style file. Every field is optional; anything
/// missing falls back to the process environment or a default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cache_ttl_ms: Option<u64>,
    pub serve_frontend: Option<bool>,
    pub frontend_root: Option<PathBuf>,
}

/// Fully resolved settings the backend runs with.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: String,
    pub host: String,
    pub port: u16,
    pub cache_ttl: Duration,
    pub serve_frontend: bool,
    pub frontend_root: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            serve_frontend: true,
            frontend_root: PathBuf::from(DEFAULT_FRONTEND_ROOT),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl EnvConfig {
    /// Applies a single `KEY=VALUE` pair. Unknown keys are ignored so the same
    /// file can carry settings for other tools.
    fn apply(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        match key {
            "TMDB_API_KEY" => self.tmdb_api_key = non_empty(value),
            "TMDB_BASE_URL" => {
                if let Some(url) = non_empty(value) {
                    self.tmdb_base_url = Some(url.trim_end_matches('/').to_string());
                }
            }
            "HOST" => {
                if let Some(host) = non_empty(value) {
                    self.host = Some(host);
                }
            }
            "PORT" => {
                let port: u16 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Parsing PORT from {origin}"))?;
                self.port = Some(port);
            }
            "CACHE_TTL_MS" => {
                let ttl: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Parsing CACHE_TTL_MS from {origin}"))?;
                self.cache_ttl_ms = Some(ttl);
            }
            "SERVE_FRONTEND" => self.serve_frontend = Some(parse_bool(value)),
            "FRONTEND_ROOT" => {
                if let Some(root) = non_empty(value) {
                    self.frontend_root = Some(PathBuf::from(root));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Later sources win over earlier ones.
    fn overlay(self, other: EnvConfig) -> EnvConfig {
        EnvConfig {
            tmdb_api_key: other.tmdb_api_key.or(self.tmdb_api_key),
            tmdb_base_url: other.tmdb_base_url.or(self.tmdb_base_url),
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            cache_ttl_ms: other.cache_ttl_ms.or(self.cache_ttl_ms),
            serve_frontend: other.serve_frontend.or(self.serve_frontend),
            frontend_root: other.frontend_root.or(self.frontend_root),
        }
    }
}

pub const ENV_KEYS: [&str; 7] = [
    "TMDB_API_KEY",
    "TMDB_BASE_URL",
    "HOST",
    "PORT",
    "CACHE_TTL_MS",
    "SERVE_FRONTEND",
    "FRONTEND_ROOT",
];

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let origin = path.display().to_string();
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"').trim_matches('\'');
            cfg.apply(key.trim(), value, &origin)?;
        }
    }
    Ok(Some(cfg))
}

/// Collects overrides from a variable lookup, normally `std::env::var`.
pub fn read_process_env<F>(lookup: F) -> Result<EnvConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = EnvConfig::default();
    for key in ENV_KEYS {
        if let Some(value) = lookup(key) {
            cfg.apply(key, &value, "environment")?;
        }
    }
    Ok(cfg)
}

/// Resolves configuration from the env file at `path` (optional) and then the
/// process environment, which takes precedence.
pub fn load_backend_config_from<F>(path: impl AsRef<Path>, lookup: F) -> Result<BackendConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    let file = read_env_config(path)?.unwrap_or_default();
    let env = read_process_env(lookup)?;
    let merged = file.overlay(env);

    let defaults = BackendConfig::default();
    Ok(BackendConfig {
        tmdb_api_key: merged.tmdb_api_key,
        tmdb_base_url: merged.tmdb_base_url.unwrap_or(defaults.tmdb_base_url),
        host: merged.host.unwrap_or(defaults.host),
        port: merged.port.unwrap_or(defaults.port),
        cache_ttl: merged
            .cache_ttl_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.cache_ttl),
        serve_frontend: merged.serve_frontend.unwrap_or(defaults.serve_frontend),
        frontend_root: merged.frontend_root.unwrap_or(defaults.frontend_root),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn read_env_config_extracts_key_and_port() {
        let cfg = make_config("# tmdb\nTMDB_API_KEY=\"abc123\"\nPORT=\"4242\"\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.tmdb_api_key.as_deref(), Some("abc123"));
        assert_eq!(parsed.port, Some(4242));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_backend_config_from(dir.path().join(".env"), no_env).unwrap();
        assert!(config.tmdb_api_key.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.cache_ttl, Duration::from_millis(DEFAULT_CACHE_TTL_MS));
        assert!(config.serve_frontend);
        assert_eq!(config.tmdb_base_url, DEFAULT_TMDB_BASE_URL);
    }

    #[test]
    fn process_env_overrides_file() {
        let cfg = make_config("TMDB_API_KEY=from-file\nCACHE_TTL_MS=1000\n");
        let env: HashMap<&str, &str> = [("TMDB_API_KEY", "from-env"), ("SERVE_FRONTEND", "FALSE")]
            .into_iter()
            .collect();
        let config =
            load_backend_config_from(cfg.path(), |key| env.get(key).map(|v| v.to_string()))
                .unwrap();
        assert_eq!(config.tmdb_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.cache_ttl, Duration::from_millis(1000));
        assert!(!config.serve_frontend);
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let cfg = make_config("TMDB_API_KEY=\n");
        let config = load_backend_config_from(cfg.path(), no_env).unwrap();
        assert!(config.tmdb_api_key.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let cfg = make_config("TMDB_BASE_URL=http://localhost:9000/3/\n");
        let config = load_backend_config_from(cfg.path(), no_env).unwrap();
        assert_eq!(config.tmdb_base_url, "http://localhost:9000/3");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let cfg = make_config("PORT=http\n");
        assert!(load_backend_config_from(cfg.path(), no_env).is_err());
    }
}
