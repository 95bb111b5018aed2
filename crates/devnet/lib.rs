//! The local devnet orchestrator (§4.14): spawns an ephemeral L1 node,
//! deploys against it with a direct-signing adapter instead of the remote
//! Signer, and captures its dumped state as part of the bundle.

pub mod errors;
pub mod ipc_client;
pub mod node;
pub mod orchestrator;
pub mod signer;

pub use errors::DevnetError;
pub use ipc_client::IpcL1Client;
pub use node::{L1NodeConfig, L1NodeHandle};
pub use orchestrator::{DevnetOrchestrator, L1_STATE_DUMP_ARTIFACT};
pub use signer::DirectSigner;
