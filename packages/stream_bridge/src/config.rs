use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::BridgeError;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 9000
//
//   env var:         STREAM_BRIDGE_SERVER__PORT=9000   (double underscore = nesting)
//
//   CLI:             --port 9000                       (highest priority)

/// Top-level configuration, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// App that `/` redirects to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_app: Option<String>,
    /// App name -> directory holding a prebuilt client app
    #[serde(default)]
    pub routes: BTreeMap<String, PathBuf>,
    /// Arbitrary table exposed to client apps at `/settings.json`
    #[serde(default = "default_settings")]
    pub settings: serde_json::Value,
    /// Directory of the config file, used to resolve relative app paths
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
            metadata: MetadataConfig::default(),
            default_app: None,
            routes: BTreeMap::new(),
            settings: default_settings(),
            base_dir: None,
        }
    }
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Driver settings for the bundled binary (lives under `[pipeline]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Publish a synthetic `demo` stream every tick
    #[serde(default)]
    pub demo: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            demo: false,
        }
    }
}

impl PipelineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Browser form for annotating the pipeline with metadata (lives under
/// `[metadata]`). Served on its own listener.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_metadata_port")]
    pub port: u16,
    /// Form field name -> how to render it
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_metadata_port(),
            fields: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldConfig {
    /// HTML input type; `text` when unset
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FieldConfig {
    pub fn input_type(&self) -> &str {
        self.kind.as_deref().unwrap_or("text")
    }

    pub fn placeholder_for(&self, name: &str) -> String {
        self.placeholder
            .clone()
            .unwrap_or_else(|| format!("{} value", name))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_metadata_port() -> u16 {
    8800
}
fn default_tick_interval_ms() -> u64 {
    100
}
fn default_settings() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Build a figment that layers: defaults → config file → STREAM_BRIDGE_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `STREAM_BRIDGE_SERVER__PORT=9000`  →  `server.port = 9000`
///   `STREAM_BRIDGE_PIPELINE__DEMO=true`  →  `pipeline.demo = true`
pub fn load_config(config_file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("STREAM_BRIDGE_").split("__"))
}

impl BridgeConfig {
    /// Load and extract the layered configuration.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_file {
            if !path.is_file() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            info!("Loading configuration from {}", path.display());
        }

        let mut config: BridgeConfig = load_config(config_file)
            .extract()
            .context("Failed to parse configuration")?;
        config.base_dir = config_file
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        Ok(config)
    }

    /// Resolve every configured app route to an existing directory.
    ///
    /// Any route that cannot be resolved is fatal.
    pub fn resolve_routes(&self) -> Result<BTreeMap<String, PathBuf>, BridgeError> {
        let mut roots = Vec::new();
        if let Some(base) = &self.base_dir {
            roots.push(base.clone());
        }
        if let Ok(cwd) = std::env::current_dir() {
            roots.push(cwd);
        }

        self.routes
            .iter()
            .map(|(name, path)| {
                find_app_dir(path, &roots)
                    .map(|dir| (name.clone(), dir))
                    .ok_or_else(|| BridgeError::AppDirNotFound {
                        name: name.clone(),
                        path: path.clone(),
                    })
            })
            .collect()
    }
}

/// Find `path` as a directory: absolute paths are checked directly, relative
/// ones against each search root in order.
pub fn find_app_dir(path: &Path, roots: &[PathBuf]) -> Option<PathBuf> {
    if path.is_absolute() {
        return path.is_dir().then(|| path.to_path_buf());
    }
    roots
        .iter()
        .map(|root| root.join(path))
        .find(|candidate| candidate.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_defaults() {
        let c = BridgeConfig::default();
        assert_eq!(c.server.host, "127.0.0.1");
        assert_eq!(c.server.port, 8000);
        assert_eq!(c.pipeline.tick_interval_ms, 100);
        assert!(!c.pipeline.demo);
        assert!(!c.metadata.enabled);
        assert_eq!(c.metadata.port, 8800);
        assert!(c.routes.is_empty());
        assert_eq!(c.settings, serde_json::json!({}));
    }

    #[test]
    fn test_tick_interval_never_zero() {
        let p = PipelineConfig {
            tick_interval_ms: 0,
            demo: false,
        };
        assert_eq!(p.tick_interval(), Duration::from_millis(1));
    }

    // ── file loading ────────────────────────────────────────────────────

    #[test]
    fn test_load_from_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bridge.toml");
        fs::write(
            &path,
            r#"
default_app = "monitor"

[server]
port = 9123

[pipeline]
demo = true

[metadata]
enabled = true
port = 8883

[metadata.fields.email]
type = "email"
default = "hello@example.com"

[metadata.fields.address]

[routes]
monitor = "www/monitor"

[settings]
title = "EEG"
channels = 8
"#,
        )
        .unwrap();

        let c = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(c.server.port, 9123);
        assert_eq!(c.server.host, "127.0.0.1");
        assert!(c.pipeline.demo);
        assert!(c.metadata.enabled);
        assert_eq!(c.metadata.port, 8883);
        assert_eq!(c.metadata.fields["email"].input_type(), "email");
        assert_eq!(
            c.metadata.fields["email"].default.as_deref(),
            Some("hello@example.com")
        );
        assert_eq!(c.metadata.fields["address"].input_type(), "text");
        assert_eq!(
            c.metadata.fields["address"].placeholder_for("address"),
            "address value"
        );
        assert_eq!(c.default_app.as_deref(), Some("monitor"));
        assert_eq!(c.routes["monitor"], PathBuf::from("www/monitor"));
        assert_eq!(c.settings["title"], "EEG");
        assert_eq!(c.settings["channels"], 8);
        assert_eq!(c.base_dir.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(BridgeConfig::load(Some(&tmp.path().join("nope.toml"))).is_err());
    }

    // ── route resolution ────────────────────────────────────────────────

    #[test]
    fn test_resolve_routes_relative_to_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("apps/speller")).unwrap();

        let mut c = BridgeConfig::default();
        c.base_dir = Some(tmp.path().to_path_buf());
        c.routes
            .insert("speller".to_string(), PathBuf::from("apps/speller"));

        let resolved = c.resolve_routes().unwrap();
        assert_eq!(resolved["speller"], tmp.path().join("apps/speller"));
    }

    #[test]
    fn test_resolve_routes_missing_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut c = BridgeConfig::default();
        c.base_dir = Some(tmp.path().to_path_buf());
        c.routes
            .insert("ghost".to_string(), PathBuf::from("not/there"));

        match c.resolve_routes() {
            Err(BridgeError::AppDirNotFound { name, .. }) => assert_eq!(name, "ghost"),
            other => panic!("expected AppDirNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_find_app_dir_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(
            find_app_dir(tmp.path(), &[]),
            Some(tmp.path().to_path_buf())
        );
        assert_eq!(find_app_dir(&tmp.path().join("missing"), &[]), None);
    }
}
