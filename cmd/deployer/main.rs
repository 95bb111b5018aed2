use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use cli::{DeployerCommand, DeployerOptions};
use rb_deployer::{JsonRpcL1Client, L1Client, Orchestrator, ProgressCallback, RemoteSigner, TransactionSigner};
use rb_devnet::DevnetOrchestrator;
use rb_repository::{Deployment, DeploymentConfig, InMemoryRepository, Repository};
use rb_signing_client::{SigningClient, SigningClientConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use uuid::Uuid;

mod cli;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read config file {0}: {1}")]
    ReadConfig(String, std::io::Error),
    #[error("malformed config file: {0}")]
    ParseConfig(#[from] serde_json::Error),
    #[error(transparent)]
    Deployer(#[from] rb_deployer::DeployerError),
    #[error(transparent)]
    Devnet(#[from] rb_devnet::DevnetError),
    #[error(transparent)]
    Artifact(#[from] rb_artifacts::ArtifactError),
    #[error(transparent)]
    Repository(#[from] rb_repository::RepositoryError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn load_config(path: &Path) -> Result<(serde_json::Value, DeploymentConfig), CliError> {
    let raw = std::fs::read_to_string(path).map_err(|err| CliError::ReadConfig(path.display().to_string(), err))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let config: DeploymentConfig = serde_json::from_value(value.clone())?;
    config.validate().map_err(rb_deployer::DeployerError::from)?;
    Ok((value, config))
}

fn progress_logger() -> ProgressCallback {
    Box::new(|stage, fraction, message| {
        info!(?stage, progress = format!("{:.0}%", fraction * 100.0), message);
    })
}

async fn run_deploy(config_path: &Path, deployment_id: Option<String>, output: &Path) -> Result<(), CliError> {
    let (raw_config, config) = load_config(config_path)?;
    let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let deployment_id = deployment_id.unwrap_or_else(|| format!("deployment-{}", Uuid::new_v4()));
    repository.create_deployment(Deployment::new(deployment_id.clone(), None, raw_config)).await?;

    let l1: Arc<dyn L1Client> = Arc::new(JsonRpcL1Client::new(config.parent_chain_rpc.clone()));
    let signing_client = SigningClient::new(SigningClientConfig::new(config.signer_endpoint.clone(), config.signer_api_key.clone()));
    let signer: Arc<dyn TransactionSigner> = Arc::new(RemoteSigner(signing_client));
    let orchestrator = Orchestrator::new(repository.clone(), l1, signer);

    let on_progress = progress_logger();
    let cancel = CancellationToken::new();
    orchestrator.deploy(&deployment_id, &on_progress, &cancel).await?;

    rb_artifacts::extract_artifacts(repository.as_ref(), &deployment_id).await?;
    let bundle = rb_artifacts::create_bundle(repository.as_ref(), &deployment_id, &config.chain_name).await?;
    tokio::fs::write(output, bundle).await?;
    info!(deployment_id, output = %output.display(), "bundle written");
    Ok(())
}

async fn run_devnet(config_path: &Path, deployment_id: Option<String>, output: &Path, bundles_root: &Path) -> Result<(), CliError> {
    let (raw_config, config) = load_config(config_path)?;
    let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let deployment_id = deployment_id.unwrap_or_else(|| format!("devnet-{}", Uuid::new_v4()));
    repository.create_deployment(Deployment::new(deployment_id.clone(), None, raw_config)).await?;

    let devnet = DevnetOrchestrator::new(repository.clone(), bundles_root.to_path_buf());
    let on_progress = progress_logger();
    let cancel = CancellationToken::new();
    devnet.run(&deployment_id, config.parent_chain_id, &on_progress, &cancel).await?;

    rb_artifacts::extract_artifacts(repository.as_ref(), &deployment_id).await?;
    let bundle = rb_artifacts::create_bundle(repository.as_ref(), &deployment_id, &config.chain_name).await?;
    tokio::fs::write(output, bundle).await?;
    info!(deployment_id, output = %output.display(), "devnet bundle written");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let opts = DeployerOptions::parse();
    let result = match opts.command {
        DeployerCommand::Deploy { config, deployment_id, output } => run_deploy(&config, deployment_id, &output).await,
        DeployerCommand::Devnet { config, deployment_id, output, bundles_root } => {
            run_devnet(&config, deployment_id, &output, &bundles_root).await
        }
    };

    if let Err(err) = result {
        error!(%err, "deployer run failed");
        std::process::exit(1);
    }
}
