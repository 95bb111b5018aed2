use ethereum_types::U256;
use rb_repository::{ConfigValidationError, RepositoryError};
use rb_signing_client::EthClientError;

#[derive(Debug, thiserror::Error)]
pub enum DeployerError {
    #[error("chain ID mismatch: expected {expected}, L1 reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("insufficient funds: deployer has {actual}, needs {required}")]
    InsufficientFunds { actual: String, required: String },
    #[error("stage {stage} failed: {message}")]
    StageFailed { stage: String, message: String },
    #[error(transparent)]
    Config(#[from] ConfigValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Signing(#[from] EthClientError),
    #[error("L1 RPC error: {0}")]
    L1Rpc(String),
    #[error("deployment {0} cannot be resumed from status {1}")]
    NotResumable(String, String),
}

/// Formats a wei amount as whole units with up to 4 decimal places,
/// trailing zeros trimmed (§4.10 preflight, `InsufficientFunds` formatting).
pub fn format_whole_units(wei: U256, decimals: u32) -> String {
    let scale = U256::from(10u64).pow(U256::from(18u32));
    let whole = wei / scale;
    let remainder = wei % scale;
    let fraction_scale = U256::from(10u64).pow(U256::from(18 - decimals.min(18)));
    let mut fraction = (remainder / fraction_scale).as_u64();
    let mut digits = decimals.min(18);
    while digits > 0 && fraction % 10 == 0 {
        fraction /= 10;
        digits -= 1;
    }
    if digits == 0 {
        whole.to_string()
    } else {
        format!("{whole}.{fraction:0width$}", width = digits as usize)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_whole_units_trimming_trailing_zeros() {
        let one_eth = U256::from(10u64).pow(U256::from(18u32));
        assert_eq!(format_whole_units(one_eth, 4), "1");
    }

    #[test]
    fn formats_fractional_units() {
        let wei = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_whole_units(wei, 4), "1.5");
    }
}
