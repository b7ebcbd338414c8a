//! Configuration system for provtrace.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/provtrace/config.toml` and/or
//! `.provtrace/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default chaincode namespace that carries provenance writes.
pub const DEFAULT_NAMESPACE: &str = "supplychain";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub ledger: LedgerConfig,
    pub walk: WalkConfig,
}

/// Where lineage data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Chaincode namespace whose read/write sets hold provenance.
    pub namespace: String,
    /// Ledger snapshot file used by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            snapshot: None,
        }
    }
}

/// How to treat ledger data that breaks the one-per-transaction conventions
/// (several read/write sets for one namespace, several provenance writes for
/// one asset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Take the first entry in ledger order.
    #[default]
    FirstMatch,
    /// Fail the step.
    Reject,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicatePolicy::FirstMatch => write!(f, "first_match"),
            DuplicatePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Walk behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Namespace to extract read/write sets from. Taken from
    /// [`LedgerConfig::namespace`] when built from a [`TraceConfig`].
    #[serde(skip, default = "default_namespace")]
    pub namespace: String,
    /// Maximum number of steps in one chain.
    pub max_depth: usize,
    /// Refuse transactions the ledger marked invalid.
    pub require_valid_transactions: bool,
    pub duplicate_policy: DuplicatePolicy,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            max_depth: 16,
            require_valid_transactions: true,
            duplicate_policy: DuplicatePolicy::FirstMatch,
        }
    }
}

impl WalkConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "walk namespace must not be empty".into(),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                message: "walk.max_depth must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl TraceConfig {
    /// Walk settings with the ledger namespace applied.
    pub fn walk_config(&self) -> WalkConfig {
        self.walk.clone().with_namespace(self.ledger.namespace.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.walk_config().validate()
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "provtrace", "provtrace")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PROVTRACE_`)
/// 3. Workspace-local config (`.provtrace/config.toml`)
/// 4. User config (`~/.config/provtrace/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&TraceConfig>,
) -> Result<TraceConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(TraceConfig::default()));

    // User-level config
    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".provtrace").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (PROVTRACE_WALK__MAX_DEPTH, PROVTRACE_LEDGER__NAMESPACE, etc.)
    figment = figment.merge(Env::prefixed("PROVTRACE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from one explicit TOML file layered over the defaults.
pub fn load_config_file(path: &Path) -> Result<TraceConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Figment::from(Serialized::defaults(TraceConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PROVTRACE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Check whether any provtrace configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }

    if let Some(ws) = workspace {
        if ws.join(".provtrace").join("config.toml").exists() {
            return true;
        }
    }

    false
}
