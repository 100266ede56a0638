//! Error types for the BlockPort Gateway

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported chain: {chain}")]
    UnsupportedChain { chain: String },

    #[error("Asset {asset} is not configured for chain {chain}")]
    UnsupportedAsset { chain: String, asset: String },

    #[error("Malformed amount {amount:?}: {message}")]
    MalformedAmount { amount: String, message: String },

    #[error("Adapter error on chain {chain}: {message}")]
    Adapter { chain: String, message: String },

    #[error("Timeout waiting for {operation} on chain {chain}")]
    AdapterTimeout { chain: String, operation: String },

    #[error("Transaction {tx_id} not found")]
    TransactionNotFound { tx_id: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Check if error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Adapter { .. } | GatewayError::AdapterTimeout { .. }
        )
    }

    /// Check if error was caused by the request rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::UnsupportedChain { .. }
                | GatewayError::UnsupportedAsset { .. }
                | GatewayError::MalformedAmount { .. }
                | GatewayError::TransactionNotFound { .. }
        )
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
