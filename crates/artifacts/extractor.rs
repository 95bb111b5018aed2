//! Reads the raw outputs of a completed deployment and emits the nine
//! canonical operator-facing files (§4.13), saving each as an artifact.

use rand::RngCore;
use rb_repository::{Artifact, DeploymentConfig, DeploymentStatus, Repository};
use serde_json::{json, Value};

use crate::errors::ArtifactError;

/// Internal-only artifact type the orchestrator writes mid-pipeline;
/// excluded from bundles (§4.13).
pub const RAW_ADDRESSES_ARTIFACT: &str = "raw_addresses";
const GENESIS_ARTIFACT: &str = "genesis.json";
const ROLLUP_ARTIFACT: &str = "rollup.json";

async fn raw_json_artifact(repository: &dyn Repository, deployment_id: &str, artifact_type: &str) -> Option<Value> {
    let artifact = repository.get_artifact(deployment_id, artifact_type).await.ok()?;
    serde_json::from_slice(&artifact.content).ok()
}

fn flatten_addresses(raw: &Value) -> serde_json::Map<String, Value> {
    let mut flattened = serde_json::Map::new();
    if let Some(object) = raw.as_object() {
        for (key, value) in object {
            if let Some(nested) = value.as_object() {
                for (nested_key, nested_value) in nested {
                    flattened.insert(format!("{key}.{nested_key}"), nested_value.clone());
                }
            } else {
                flattened.insert(key.clone(), value.clone());
            }
        }
    }
    flattened
}

fn synthesize_genesis(config: &DeploymentConfig) -> Value {
    json!({ "chainId": config.chain_id, "alloc": {}, "gasLimit": format!("0x{:x}", config.gas_limit) })
}

fn synthesize_rollup(config: &DeploymentConfig, addresses: &serde_json::Map<String, Value>) -> Value {
    json!({
        "genesis": { "l2_time": 0, "l1": {} },
        "block_time": config.block_time_seconds,
        "max_sequencer_drift": config.sequencer_drift_seconds,
        "seq_window_size": config.sequencer_window_blocks,
        "batch_inbox_address": format!("{:#x}", rb_deployer::batch_inbox_address(config.chain_id)),
        "l2_chain_id": config.chain_id,
        "da_namespace": config.da_namespace,
        "addresses": addresses,
        // Hardfork timestamps all activate at genesis.
        "regolith_time": 0,
        "canyon_time": 0,
        "delta_time": 0,
        "ecotone_time": 0,
        "fjord_time": 0,
        "granite_time": 0,
    })
}

fn deploy_config_echo(config: &DeploymentConfig) -> Value {
    let mut value = serde_json::to_value(config).expect("DeploymentConfig is always representable as JSON");
    if let Some(object) = value.as_object_mut() {
        object.remove("signer_api_key");
    }
    value
}

fn random_jwt_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

fn docker_compose_template(config: &DeploymentConfig) -> String {
    format!(
        "services:\n  op-geth:\n    image: op-geth:latest\n    environment:\n      - CHAIN_ID={}\n  op-node:\n    image: op-node:latest\n    environment:\n      - ROLLUP_CONFIG=/config/rollup.json\n      - L1_RPC={}\n",
        config.chain_id, config.parent_chain_rpc
    )
}

fn env_example_template() -> &'static str {
    "L1_RPC_URL=\nL1_BEACON_URL=\nSIGNER_ENDPOINT=\nSIGNER_API_KEY=\nJWT_SECRET=./jwt.txt\n"
}

fn config_toml_template(config: &DeploymentConfig) -> String {
    format!("[da]\nnamespace = \"{}\"\n", config.da_namespace.clone().unwrap_or_default())
}

fn readme(config: &DeploymentConfig) -> String {
    format!(
        "# {} deployment bundle\n\nChain ID: {}\nParent chain ID: {}\n\nSee docker-compose.yml to run the stack and .env.example for required secrets.\n",
        config.chain_name, config.chain_id, config.parent_chain_id
    )
}

/// Produces and saves the nine canonical artifacts for a completed or
/// simulated deployment. Fails if `genesis.json` cannot be found or
/// synthesized (it never can be synthesized — §4.13 item 1 requires a
/// saved pipeline output).
pub async fn extract_artifacts(repository: &dyn Repository, deployment_id: &str) -> Result<Vec<Artifact>, ArtifactError> {
    let deployment = repository.get_deployment(deployment_id).await?;
    if !matches!(deployment.status, DeploymentStatus::Completed | DeploymentStatus::Simulated) {
        return Err(ArtifactError::MissingRequired(format!(
            "deployment {deployment_id} is not completed or simulated (status: {:?})",
            deployment.status
        )));
    }
    let config: DeploymentConfig = serde_json::from_value(deployment.configuration.clone())?;

    let genesis = raw_json_artifact(repository, deployment_id, GENESIS_ARTIFACT)
        .await
        .ok_or_else(|| ArtifactError::MissingRequired(GENESIS_ARTIFACT.to_string()))?;

    let raw_addresses = raw_json_artifact(repository, deployment_id, RAW_ADDRESSES_ARTIFACT).await.unwrap_or(json!({}));
    let addresses = flatten_addresses(&raw_addresses);

    let rollup = match raw_json_artifact(repository, deployment_id, ROLLUP_ARTIFACT).await {
        Some(rollup) => rollup,
        None => synthesize_rollup(&config, &addresses),
    };

    let mut artifacts = vec![
        Artifact::new(deployment_id, "genesis.json", serde_json::to_vec_pretty(&genesis)?),
        Artifact::new(deployment_id, "rollup.json", serde_json::to_vec_pretty(&rollup)?),
        Artifact::new(deployment_id, "addresses.json", serde_json::to_vec_pretty(&addresses)?),
        Artifact::new(deployment_id, "deploy-config.json", serde_json::to_vec_pretty(&deploy_config_echo(&config))?),
        Artifact::new(deployment_id, "jwt.txt", random_jwt_secret().into_bytes()),
        Artifact::new(deployment_id, "docker-compose.yml", docker_compose_template(&config).into_bytes()),
        Artifact::new(deployment_id, ".env.example", env_example_template().as_bytes().to_vec()),
        Artifact::new(deployment_id, "README.md", readme(&config).into_bytes()),
    ];
    if config.da_namespace.is_some() {
        artifacts.push(Artifact::new(deployment_id, "config.toml", config_toml_template(&config).into_bytes()));
    }

    for artifact in &artifacts {
        repository.put_artifact(artifact.clone()).await?;
    }
    Ok(artifacts)
}

#[cfg(test)]
mod test {
    use super::*;
    use rb_repository::{Deployment, InMemoryRepository, Stage};
    use serde_json::json as js;

    fn sample_config_value() -> Value {
        js({
            "chain_id": 42,
            "chain_name": "test-chain",
            "parent_chain_id": 11155111,
            "parent_chain_rpc": "http://localhost:8545",
            "signer_endpoint": "http://localhost:8551",
            "signer_api_key": "super-secret",
            "deployer_address": "0x0000000000000000000000000000000000000001",
            "batcher_address": null,
            "proposer_address": null,
            "sequencer_address": null,
            "challenger_address": null,
            "da_namespace": null,
            "reuse_infrastructure": false,
            "existing_shared_addresses": null,
        })
    }

    async fn completed_deployment(repo: &InMemoryRepository) {
        let mut deployment = Deployment::new("d1", None, sample_config_value());
        deployment.status = DeploymentStatus::Completed;
        deployment.stage = Some(Stage::Completed);
        repo.create_deployment(deployment).await.unwrap();
        repo.put_artifact(Artifact::new("d1", GENESIS_ARTIFACT, br#"{"chainId":42}"#.to_vec())).await.unwrap();
    }

    #[tokio::test]
    async fn extraction_fails_without_genesis() {
        let repo = InMemoryRepository::new();
        let mut deployment = Deployment::new("d1", None, sample_config_value());
        deployment.status = DeploymentStatus::Completed;
        repo.create_deployment(deployment).await.unwrap();
        assert!(matches!(extract_artifacts(&repo, "d1").await, Err(ArtifactError::MissingRequired(_))));
    }

    #[tokio::test]
    async fn extraction_produces_eight_files_without_da() {
        let repo = InMemoryRepository::new();
        completed_deployment(&repo).await;
        let artifacts = extract_artifacts(&repo, "d1").await.unwrap();
        assert_eq!(artifacts.len(), 8);
        assert!(artifacts.iter().any(|a| a.artifact_type == "jwt.txt"));
        assert!(!artifacts.iter().any(|a| a.artifact_type == "config.toml"));
    }

    #[tokio::test]
    async fn deploy_config_echo_strips_signer_api_key() {
        let repo = InMemoryRepository::new();
        completed_deployment(&repo).await;
        extract_artifacts(&repo, "d1").await.unwrap();
        let artifact = repo.get_artifact("d1", "deploy-config.json").await.unwrap();
        let text = String::from_utf8(artifact.content).unwrap();
        assert!(!text.contains("super-secret"));
    }

    #[tokio::test]
    async fn rollup_json_zeroes_hardfork_timestamps() {
        let repo = InMemoryRepository::new();
        completed_deployment(&repo).await;
        extract_artifacts(&repo, "d1").await.unwrap();
        let artifact = repo.get_artifact("d1", "rollup.json").await.unwrap();
        let rollup: Value = serde_json::from_slice(&artifact.content).unwrap();
        assert_eq!(rollup["ecotone_time"], js(0));
    }

    #[tokio::test]
    async fn jwt_secret_is_a_0x_prefixed_32_byte_hex_string() {
        let repo = InMemoryRepository::new();
        completed_deployment(&repo).await;
        extract_artifacts(&repo, "d1").await.unwrap();
        let artifact = repo.get_artifact("d1", "jwt.txt").await.unwrap();
        let text = String::from_utf8(artifact.content).unwrap();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + 64);
        assert!(text[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
