use std::{fs, path::Path};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use serv_primitives::Address;

/// Chain configuration: the governance authority plus the genesis state of
/// every runtime module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: String,
    /// Address allowed to update module parameters.
    pub governance: String,
    pub proof_of_service: proof_of_service::GenesisState,
    pub node_rewards: node_rewards::GenesisState,
    pub serv_rewards: serv_rewards::GenesisState,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: "serv-local".to_string(),
            governance: "gov".to_string(),
            proof_of_service: Default::default(),
            node_rewards: Default::default(),
            serv_rewards: Default::default(),
        }
    }
}

impl ChainConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read chain config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid chain config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse chain config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        // Going through `toml::Value` emits plain keys before tables.
        let value = toml::Value::try_from(self).context("failed to encode chain config")?;
        toml::to_string_pretty(&value).context("failed to render chain config")
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory {}", dir.display()))?;
        }
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("failed to write chain config {}", path.display()))
    }

    pub fn authority(&self) -> Result<Address> {
        Address::new(self.governance.as_str())
            .with_context(|| format!("invalid governance address {:?}", self.governance))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id.is_empty() {
            anyhow::bail!("chain id cannot be empty");
        }
        self.authority()?;
        self.proof_of_service
            .validate()
            .context("invalid proof_of_service genesis")?;
        self.node_rewards
            .validate()
            .context("invalid node_rewards genesis")?;
        self.serv_rewards
            .validate()
            .context("invalid serv_rewards genesis")?;
        Ok(())
    }
}
