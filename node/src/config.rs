//! # Node Configuration
//!
//! Layers configuration from, in ascending priority: the engine's built-in
//! `local_test`/`mainnet_default` profile, an optional TOML file, and CLI
//! flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use consensus_core::consensus::params::{ParamsError, Parameters};

/// The on-disk / CLI-overridable node configuration. Every field is
/// optional so a partial file only overrides what it names; anything left
/// `None` falls back to the selected profile's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Consensus tunables, layered over a named profile.
    #[serde(default)]
    pub consensus: ConsensusSection,
    /// Simulated quorum size for the demo harness.
    #[serde(default)]
    pub simulation: SimulationSection,
    /// Network-facing ports.
    #[serde(default)]
    pub network: NetworkSection,
}

/// Consensus tunable overrides. `None` means "use the profile's value".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusSection {
    /// Start from this named profile (`"mainnet"` or `"local"`).
    pub profile: Option<String>,
    pub k: Option<u32>,
    pub alpha_pref: Option<u32>,
    pub alpha_conf: Option<u32>,
    pub beta: Option<u32>,
    pub concurrent_polls: Option<u32>,
    pub optimal_processing: Option<u32>,
    pub max_outstanding: Option<u32>,
    pub max_item_processing_time_secs: Option<u64>,
}

/// Tuning for the in-process simulated quorum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Number of simulated validators backing the demo quorum.
    pub validator_count: usize,
    /// Milliseconds between poll rounds.
    pub round_interval_ms: u64,
    /// Propose a new block once every this many rounds.
    pub propose_every_n_rounds: u64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            validator_count: 5,
            round_interval_ms: 500,
            propose_every_n_rounds: 3,
        }
    }
}

/// Network-facing listen ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    /// HTTP API / metrics listen port.
    pub api_port: u16,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self { api_port: 8080 }
    }
}

/// Errors from loading or resolving a [`NodeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The config file was not valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// An unrecognized consensus profile name was given.
    #[error("unknown consensus profile: {0} (expected \"mainnet\" or \"local\")")]
    UnknownProfile(String),
    /// The resolved consensus tunables failed validation.
    #[error("invalid consensus parameters: {0}")]
    InvalidParams(#[from] ParamsError),
}

impl NodeConfig {
    /// Load a config file from disk, if `path` is given. Returns the
    /// default config (everything falls back to profile defaults) when
    /// `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolve the layered consensus section into a validated
    /// [`Parameters`], starting from the named (or default `"local"`)
    /// profile and applying any per-field overrides.
    pub fn resolve_parameters(&self) -> Result<Parameters, ConfigError> {
        let profile = self.consensus.profile.as_deref().unwrap_or("local");
        let mut params = match profile {
            "mainnet" => Parameters::mainnet_default(),
            "local" => Parameters::local_test(),
            other => return Err(ConfigError::UnknownProfile(other.to_string())),
        };

        if let Some(k) = self.consensus.k {
            params.k = k;
        }
        if let Some(alpha_pref) = self.consensus.alpha_pref {
            params.alpha_pref = alpha_pref;
        }
        if let Some(alpha_conf) = self.consensus.alpha_conf {
            params.alpha_conf = alpha_conf;
        }
        if let Some(beta) = self.consensus.beta {
            params.beta = beta;
        }
        if let Some(concurrent_polls) = self.consensus.concurrent_polls {
            params.concurrent_polls = concurrent_polls;
        }
        if let Some(optimal_processing) = self.consensus.optimal_processing {
            params.optimal_processing = optimal_processing;
        }
        if let Some(max_outstanding) = self.consensus.max_outstanding {
            params.max_outstanding = max_outstanding;
        }
        if let Some(secs) = self.consensus.max_item_processing_time_secs {
            params.max_item_processing_time = Duration::from_secs(secs);
        }

        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_to_local_test_profile() {
        let config = NodeConfig::default();
        let params = config.resolve_parameters().unwrap();
        assert_eq!(params, Parameters::local_test());
    }

    #[test]
    fn mainnet_profile_can_be_selected() {
        let mut config = NodeConfig::default();
        config.consensus.profile = Some("mainnet".to_string());
        let params = config.resolve_parameters().unwrap();
        assert_eq!(params, Parameters::mainnet_default());
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let mut config = NodeConfig::default();
        config.consensus.profile = Some("bogus".to_string());
        assert!(matches!(
            config.resolve_parameters(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn per_field_overrides_apply_on_top_of_profile() {
        let mut config = NodeConfig::default();
        config.consensus.k = Some(7);
        config.consensus.alpha_pref = Some(5);
        config.consensus.alpha_conf = Some(5);
        config.consensus.beta = Some(3);
        let params = config.resolve_parameters().unwrap();
        assert_eq!(params.k, 7);
        assert_eq!(params.beta, 3);
    }

    #[test]
    fn invalid_override_combination_fails_validation() {
        let mut config = NodeConfig::default();
        config.consensus.k = Some(1);
        config.consensus.alpha_conf = Some(5);
        assert!(matches!(
            config.resolve_parameters(),
            Err(ConfigError::InvalidParams(_))
        ));
    }

    #[test]
    fn parses_toml_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            r#"
            [consensus]
            profile = "mainnet"
            beta = 25

            [simulation]
            validator_count = 9
            round_interval_ms = 250
            propose_every_n_rounds = 2

            [network]
            api_port = 9090
            "#,
        )
        .unwrap();

        let config = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.simulation.validator_count, 9);
        assert_eq!(config.network.api_port, 9090);
        let params = config.resolve_parameters().unwrap();
        assert_eq!(params.beta, 25);
        assert_eq!(params.k, 20); // inherited from the mainnet profile
    }
}
