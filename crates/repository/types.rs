//! The persisted data model (§3): deployments, stages, recorded transactions,
//! artifacts and infrastructure records, plus the deployment configuration
//! blob they all reference.

use chrono::{DateTime, Utc};
use ethereum_types::Address;
use serde::{Deserialize, Serialize};

/// Reserved L1 chain IDs that must never be accepted as an L2 chain ID.
pub const RESERVED_L1_CHAIN_IDS: [u64; 3] = [1, 11155111, 17000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Paused,
    Failed,
    Completed,
    Simulated,
}

impl DeploymentStatus {
    /// `completed` and `simulated` never transition out; `resume` is only
    /// meaningful from {paused, running, failed}.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Simulated)
    }

    pub fn can_resume(self) -> bool {
        matches!(self, Self::Paused | Self::Running | Self::Failed)
    }
}

/// Ordered per §3; `PartialOrd`/`Ord` follow declaration order, giving the
/// "is complete" predicate (`current.ordinal() > queried.ordinal()`) for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    DeploySuperchain,
    DeployImplementations,
    DeployOpchain,
    DeployAltDa,
    GenerateGenesis,
    SetStartBlock,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Init,
        Stage::DeploySuperchain,
        Stage::DeployImplementations,
        Stage::DeployOpchain,
        Stage::DeployAltDa,
        Stage::GenerateGenesis,
        Stage::SetStartBlock,
        Stage::Completed,
    ];

    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).expect("Stage::ALL is exhaustive")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    /// Owning organization/tenant, used only for the range queries in §4.8.
    pub org: Option<String>,
    pub configuration: serde_json::Value,
    pub status: DeploymentStatus,
    pub stage: Option<Stage>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(id: impl Into<String>, org: Option<String>, configuration: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            org,
            configuration,
            status: DeploymentStatus::Pending,
            stage: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Strict: holds iff the deployment has progressed past `queried`.
    pub fn is_stage_complete(&self, queried: Stage) -> bool {
        self.stage.is_some_and(|current| current.ordinal() > queried.ordinal())
    }

    pub fn can_resume(&self) -> bool {
        self.status.can_resume()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedTransaction {
    pub deployment_id: String,
    pub stage: Stage,
    pub hash: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Non-JSON payloads are wrapped so they survive JSON-column normalization
/// (§3); `content` here is always the raw unwrapped bytes in memory, and
/// the wrapper is applied only at the serialization boundary (`to_envelope`).
#[derive(Debug, Clone)]
pub struct Artifact {
    pub deployment_id: String,
    pub artifact_type: String,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "snake_case")]
enum ArtifactEnvelope {
    Base64 { data: String },
}

impl Artifact {
    pub fn new(deployment_id: impl Into<String>, artifact_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self { deployment_id: deployment_id.into(), artifact_type: artifact_type.into(), content, created_at: Utc::now() }
    }

    /// Wraps non-UTF-8 content as `{"_type":"base64","data":"…"}`; UTF-8
    /// content is returned as-is since it can live directly in a JSON column.
    pub fn to_envelope(&self) -> serde_json::Value {
        match std::str::from_utf8(&self.content) {
            Ok(text) => serde_json::Value::String(text.to_string()),
            Err(_) => {
                use base64::Engine;
                let data = base64::engine::general_purpose::STANDARD.encode(&self.content);
                serde_json::json!({ "_type": "base64", "data": data })
            }
        }
    }

    /// Detects and unwraps both the base64 envelope and a legacy
    /// escaped-string form, falling back to raw UTF-8 bytes.
    pub fn from_envelope(value: &serde_json::Value) -> Vec<u8> {
        if let Some(object) = value.as_object() {
            if object.get("_type").and_then(serde_json::Value::as_str) == Some("base64") {
                if let Some(data) = object.get("data").and_then(serde_json::Value::as_str) {
                    use base64::Engine;
                    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
                        return bytes;
                    }
                }
            }
        }
        if let Some(text) = value.as_str() {
            // Legacy escaped-string form: the envelope object stringified twice.
            if let Ok(inner) = serde_json::from_str::<serde_json::Value>(text) {
                return Self::from_envelope(&inner);
            }
            return text.as_bytes().to_vec();
        }
        value.to_string().into_bytes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureRecord {
    pub l1_chain_id: u64,
    pub artifact_version: String,
    pub deployment_salt: String,
    pub shared_addresses: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub parent_chain_id: u64,
    pub parent_chain_rpc: String,
    pub signer_endpoint: String,
    pub signer_api_key: Option<String>,
    pub deployer_address: Address,
    pub batcher_address: Option<Address>,
    pub proposer_address: Option<Address>,
    pub sequencer_address: Option<Address>,
    pub challenger_address: Option<Address>,
    #[serde(default = "default_block_time")]
    pub block_time_seconds: u64,
    #[serde(default = "default_sequencer_drift")]
    pub sequencer_drift_seconds: u64,
    #[serde(default = "default_sequencer_window")]
    pub sequencer_window_blocks: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    pub da_namespace: Option<String>,
    #[serde(default)]
    pub reuse_infrastructure: bool,
    pub existing_shared_addresses: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_block_time() -> u64 {
    2
}
fn default_sequencer_drift() -> u64 {
    600
}
fn default_sequencer_window() -> u64 {
    3600
}
fn default_gas_limit() -> u64 {
    30_000_000
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("chain_id must not be 0")]
    ZeroChainId,
    #[error("chain_id {0} is a reserved L1 chain ID and cannot be used as an L2 chain ID")]
    ReservedChainId(u64),
    #[error("chain_name must be 2-64 characters of [a-zA-Z0-9_-], with no leading or trailing hyphen")]
    InvalidChainName,
}

impl DeploymentConfig {
    pub fn batcher(&self) -> Address {
        self.batcher_address.unwrap_or(self.deployer_address)
    }
    pub fn proposer(&self) -> Address {
        self.proposer_address.unwrap_or(self.deployer_address)
    }
    pub fn sequencer(&self) -> Address {
        self.sequencer_address.unwrap_or(self.deployer_address)
    }
    pub fn challenger(&self) -> Address {
        self.challenger_address.unwrap_or(self.deployer_address)
    }

    /// Smallest-unit funding requirement: 5e18 on mainnet, else 1e18.
    pub fn required_funding_wei(&self) -> u128 {
        if self.parent_chain_id == 1 {
            5_000_000_000_000_000_000
        } else {
            1_000_000_000_000_000_000
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.chain_id == 0 {
            return Err(ConfigValidationError::ZeroChainId);
        }
        if RESERVED_L1_CHAIN_IDS.contains(&self.chain_id) {
            return Err(ConfigValidationError::ReservedChainId(self.chain_id));
        }
        validate_chain_name(&self.chain_name)?;
        Ok(())
    }
}

fn validate_chain_name(name: &str) -> Result<(), ConfigValidationError> {
    let len = name.chars().count();
    if !(2..=64).contains(&len) {
        return Err(ConfigValidationError::InvalidChainName);
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ConfigValidationError::InvalidChainName);
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(ConfigValidationError::InvalidChainName);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stage_ordinals_are_monotonic() {
        assert!(Stage::Init.ordinal() < Stage::DeploySuperchain.ordinal());
        assert!(Stage::SetStartBlock.ordinal() < Stage::Completed.ordinal());
    }

    #[test]
    fn chain_name_rejects_leading_hyphen() {
        assert!(validate_chain_name("-bad").is_err());
    }

    #[test]
    fn chain_name_rejects_too_short() {
        assert!(validate_chain_name("a").is_err());
    }

    #[test]
    fn chain_name_accepts_valid() {
        assert!(validate_chain_name("op-mainnet_2").is_ok());
    }

    #[test]
    fn reserved_l1_chain_ids_are_rejected() {
        let mut config = sample_config();
        config.chain_id = 11155111;
        assert!(matches!(config.validate(), Err(ConfigValidationError::ReservedChainId(_))));
    }

    #[test]
    fn required_funding_is_higher_on_mainnet() {
        let mut config = sample_config();
        config.parent_chain_id = 1;
        assert_eq!(config.required_funding_wei(), 5_000_000_000_000_000_000);
        config.parent_chain_id = 11155111;
        assert_eq!(config.required_funding_wei(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn artifact_envelope_round_trips_binary_content() {
        let artifact = Artifact::new("d1", "jwt.txt", vec![0xff, 0x00, 0x10]);
        let envelope = artifact.to_envelope();
        assert_eq!(Artifact::from_envelope(&envelope), artifact.content);
    }

    #[test]
    fn artifact_envelope_passes_through_utf8_content() {
        let artifact = Artifact::new("d1", "README.md", b"hello".to_vec());
        let envelope = artifact.to_envelope();
        assert_eq!(envelope, serde_json::Value::String("hello".to_string()));
        assert_eq!(Artifact::from_envelope(&envelope), b"hello");
    }

    fn sample_config() -> DeploymentConfig {
        DeploymentConfig {
            chain_id: 42,
            chain_name: "test-chain".to_string(),
            parent_chain_id: 11155111,
            parent_chain_rpc: "http://localhost:8545".to_string(),
            signer_endpoint: "http://localhost:8551".to_string(),
            signer_api_key: None,
            deployer_address: Address::zero(),
            batcher_address: None,
            proposer_address: None,
            sequencer_address: None,
            challenger_address: None,
            block_time_seconds: default_block_time(),
            sequencer_drift_seconds: default_sequencer_drift(),
            sequencer_window_blocks: default_sequencer_window(),
            gas_limit: default_gas_limit(),
            da_namespace: None,
            reuse_infrastructure: false,
            existing_shared_addresses: None,
        }
    }
}
