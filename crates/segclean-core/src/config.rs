use crate::gateway::{BatchRunner, DeleteMode};
use crate::merge::MatchPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub delete: DeleteConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            call_delay_ms: default_call_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default, rename = "match")]
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteConfig {
    #[serde(default)]
    pub mode: DeleteMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_diagnostics_dir")]
    pub dir: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dir: default_diagnostics_dir(),
        }
    }
}

impl Config {
    /// Batch runner honoring the rate-limit and delete settings.
    #[must_use]
    pub const fn runner(&self) -> BatchRunner {
        BatchRunner::new(
            Duration::from_millis(self.rate_limit.call_delay_ms),
            Duration::from_millis(self.rate_limit.settle_delay_ms),
            self.delete.mode,
        )
    }
}

/// Config plus the file it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(Config::default());
    }

    serde_yaml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Locate the config file.
///
/// Precedence: explicit `--config`, `SEGCLEAN_CONFIG`, `./config.yaml`, then
/// `<user config dir>/segclean/config.yaml`. Explicit paths are returned even
/// when missing so the caller reports them; the fallbacks only when present.
#[must_use]
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let env_path = env::var_os("SEGCLEAN_CONFIG").map(PathBuf::from);
    let cwd = env::current_dir().ok();
    let user_dir = dirs::config_dir().map(|dir| dir.join("segclean"));
    discover_inner(explicit, env_path, cwd.as_deref(), user_dir.as_deref())
}

fn discover_inner(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    cwd: Option<&Path>,
    user_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path {
        return Some(path);
    }
    [cwd, user_dir]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load config from the discovered path (defaults when none) and apply
/// `SEGCLEAN_API_URL` / `SEGCLEAN_API_TOKEN`.
pub fn resolve_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = discover_config_path(explicit);
    let config = match &path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let config = apply_env_overrides(
        config,
        env::var("SEGCLEAN_API_URL").ok(),
        env::var("SEGCLEAN_API_TOKEN").ok(),
    );
    Ok(LoadedConfig { config, path })
}

fn apply_env_overrides(
    mut config: Config,
    api_url: Option<String>,
    api_token: Option<String>,
) -> Config {
    if let Some(url) = api_url.filter(|v| !v.trim().is_empty()) {
        config.api.base_url = Some(url);
    }
    if let Some(token) = api_token.filter(|v| !v.trim().is_empty()) {
        config.api.token = Some(token);
    }
    config
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_call_delay_ms() -> u64 {
    1_000
}

const fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_diagnostics_dir() -> PathBuf {
    PathBuf::from("JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert!(cfg.api.base_url.is_none());
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.rate_limit.call_delay_ms, 1_000);
        assert_eq!(cfg.rate_limit.settle_delay_ms, 2_000);
        assert_eq!(cfg.merge.policy, MatchPolicy::Contains);
        assert_eq!(cfg.delete.mode, DeleteMode::PerId);
        assert_eq!(cfg.diagnostics.dir, PathBuf::from("JSON"));
    }

    #[test]
    fn full_yaml_parses() {
        let content = r"
api:
  base_url: https://console.example.com/api/v1
  token: secret
  timeout_secs: 5
rate_limit:
  call_delay_ms: 250
  settle_delay_ms: 0
merge:
  match: suffix
delete:
  mode: bulk
diagnostics:
  dir: /tmp/segclean
";
        let cfg: Config = serde_yaml::from_str(content).expect("parse");
        assert_eq!(
            cfg.api.base_url.as_deref(),
            Some("https://console.example.com/api/v1")
        );
        assert_eq!(cfg.api.token.as_deref(), Some("secret"));
        assert_eq!(cfg.api.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.rate_limit.call_delay_ms, 250);
        assert_eq!(cfg.merge.policy, MatchPolicy::Suffix);
        assert_eq!(cfg.delete.mode, DeleteMode::Bulk);
        assert_eq!(cfg.runner().delete_mode(), DeleteMode::Bulk);
    }

    #[test]
    fn bad_yaml_is_an_error_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "merge:\n  match: [nope").expect("write");

        let err = load_config(&path).expect_err("must fail");
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("merge:\n  match: fuzzy\n");
        assert!(result.is_err());
    }

    #[test]
    fn token_is_never_serialized() {
        let mut cfg = Config::default();
        cfg.api.token = Some("secret".into());
        let rendered = serde_yaml::to_string(&cfg).expect("encode");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = Config::default();
        cfg.api.base_url = Some("https://file.example".into());
        let cfg = apply_env_overrides(
            cfg,
            Some("https://env.example".into()),
            Some("tok".into()),
        );
        assert_eq!(cfg.api.base_url.as_deref(), Some("https://env.example"));
        assert_eq!(cfg.api.token.as_deref(), Some("tok"));

        let cfg = apply_env_overrides(cfg, Some("  ".into()), None);
        assert_eq!(cfg.api.base_url.as_deref(), Some("https://env.example"));
    }

    #[test]
    fn discovery_prefers_explicit_then_env_then_cwd_then_user() {
        let cwd = tempfile::tempdir().expect("cwd");
        let user = tempfile::tempdir().expect("user");
        std::fs::write(user.path().join(CONFIG_FILE_NAME), "{}").expect("write user");

        let found = discover_inner(None, None, Some(cwd.path()), Some(user.path()));
        assert_eq!(found, Some(user.path().join(CONFIG_FILE_NAME)));

        std::fs::write(cwd.path().join(CONFIG_FILE_NAME), "{}").expect("write cwd");
        let found = discover_inner(None, None, Some(cwd.path()), Some(user.path()));
        assert_eq!(found, Some(cwd.path().join(CONFIG_FILE_NAME)));

        let env_path = PathBuf::from("/etc/segclean.yaml");
        let found = discover_inner(None, Some(env_path.clone()), Some(cwd.path()), None);
        assert_eq!(found, Some(env_path));

        let explicit = Path::new("custom.yaml");
        let found = discover_inner(Some(explicit), None, Some(cwd.path()), None);
        assert_eq!(found, Some(PathBuf::from("custom.yaml")));
    }

    #[test]
    fn discovery_without_any_file_is_none() {
        let cwd = tempfile::tempdir().expect("cwd");
        assert_eq!(discover_inner(None, None, Some(cwd.path()), None), None);
    }
}
