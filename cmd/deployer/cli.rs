use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deployer", about = "Rollup-stack contract deployment orchestrator")]
pub struct DeployerOptions {
    #[command(subcommand)]
    pub command: DeployerCommand,
}

#[derive(Subcommand)]
pub enum DeployerCommand {
    /// Runs the full deployment pipeline against a real L1 and remote Signer.
    Deploy {
        #[arg(long, value_name = "PATH", env = "DEPLOYER_CONFIG_PATH", help = "Path to a DeploymentConfig JSON file")]
        config: PathBuf,
        #[arg(long, value_name = "ID", env = "DEPLOYER_DEPLOYMENT_ID", help = "Deployment identifier; generated if omitted")]
        deployment_id: Option<String>,
        #[arg(long, value_name = "PATH", env = "DEPLOYER_BUNDLE_OUTPUT", help = "Where to write the resulting bundle ZIP")]
        output: PathBuf,
    },
    /// Spawns an ephemeral L1 node and runs the deployer against it locally.
    Devnet {
        #[arg(long, value_name = "PATH", env = "DEPLOYER_CONFIG_PATH")]
        config: PathBuf,
        #[arg(long, value_name = "ID", env = "DEPLOYER_DEPLOYMENT_ID")]
        deployment_id: Option<String>,
        #[arg(long, value_name = "PATH", env = "DEPLOYER_BUNDLE_OUTPUT")]
        output: PathBuf,
        #[arg(
            long,
            value_name = "PATH",
            default_value = "./devnet-runs",
            env = "DEPLOYER_DEVNET_BUNDLES_ROOT",
            help = "Working-directory root; each deployment gets its own subdirectory"
        )]
        bundles_root: PathBuf,
    },
}
