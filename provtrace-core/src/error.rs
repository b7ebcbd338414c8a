//! Error types for the provtrace core.
//!
//! Uses `thiserror` for public API error types, one enum per layer: read/write
//! set extraction, provenance decoding, ledger queries, configuration, and the
//! chain walk that ties them together.

use std::path::PathBuf;

use crate::types::{LineageChain, VersionRef, WalkTarget};

/// Top-level error type for the provtrace core library.
#[derive(Debug, thiserror::Error)]
pub enum ProvtraceError {
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Walk error: {0}")]
    Walk(#[from] Box<WalkError>),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from pulling one namespace's read/write set out of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("Expected exactly one action per transaction, found {count}")]
    MultipleActions { count: usize },

    #[error("Action index {index} out of range for {count} action(s)")]
    ActionIndexOutOfRange { index: usize, count: usize },

    #[error("Chaincode {namespace} does not enable provenance tracking")]
    NamespaceNotFound { namespace: String },

    #[error("Namespace {namespace} appears {count} times in one action")]
    DuplicateNamespace { namespace: String, count: usize },

    #[error("Transaction {version} has validation code {code}")]
    InvalidTransaction { version: VersionRef, code: i32 },
}

/// Errors from decoding an asset's provenance record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("The provenance for asset {asset} is not found")]
    ProvenanceNotFound { asset: String },

    #[error("Malformed provenance for asset {asset}: {reason}")]
    MalformedProvenance { asset: String, reason: String },

    #[error("Asset {asset} has {count} provenance writes in one transaction")]
    DuplicateProvenance { asset: String, count: usize },
}

/// Errors reported by a ledger query client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Not found on ledger: {what}")]
    NotFound { what: String },

    #[error("Block {block_num} holds {tx_count} transaction(s), no index {tx_num}")]
    TransactionIndexOutOfRange {
        block_num: u64,
        tx_num: u64,
        tx_count: usize,
    },

    #[error("Ledger transport failed: {message}")]
    Transport { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// What went wrong during a walk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkErrorKind {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Required dependency {dependency} of {asset} has no resolved version")]
    UnresolvedDependency { asset: String, dependency: String },

    #[error("Maximum depth must be at least 1")]
    InvalidDepth,

    #[error("Walk was cancelled")]
    Cancelled,
}

/// A walk that ended before reaching a terminal state.
///
/// Carries the chain built so far and the exact target that failed so the
/// caller can resume from that point.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Walk from {} failed at {failed_at} after {} step(s): {kind}", .chain.origin, .chain.len())]
pub struct WalkError {
    pub chain: LineageChain,
    pub failed_at: WalkTarget,
    pub kind: WalkErrorKind,
}

impl WalkError {
    /// The version that failed, when the target was already resolved.
    pub fn failed_version(&self) -> Option<VersionRef> {
        self.failed_at.version()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == WalkErrorKind::Cancelled
    }
}

/// A type alias for results using the top-level `ProvtraceError`.
pub type Result<T> = std::result::Result<T, ProvtraceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainStatus;

    #[test]
    fn test_error_display_extract() {
        let err = ProvtraceError::Extract(ExtractError::MultipleActions { count: 2 });
        assert_eq!(
            err.to_string(),
            "Extraction error: Expected exactly one action per transaction, found 2"
        );
    }

    #[test]
    fn test_error_display_namespace() {
        let err = ExtractError::NamespaceNotFound {
            namespace: "supplychain".into(),
        };
        assert_eq!(
            err.to_string(),
            "Chaincode supplychain does not enable provenance tracking"
        );
    }

    #[test]
    fn test_error_display_decode() {
        let err = ProvtraceError::Decode(DecodeError::ProvenanceNotFound {
            asset: "IPhone0".into(),
        });
        assert_eq!(
            err.to_string(),
            "Decode error: The provenance for asset IPhone0 is not found"
        );
    }

    #[test]
    fn test_error_display_ledger() {
        let err = LedgerError::TransactionIndexOutOfRange {
            block_num: 6,
            tx_num: 3,
            tx_count: 1,
        };
        assert_eq!(
            err.to_string(),
            "Block 6 holds 1 transaction(s), no index 3"
        );
    }

    #[test]
    fn test_walk_error_keeps_failed_version() {
        let mut chain = LineageChain::new("IPhone0");
        chain.status = ChainStatus::Failed;
        let err = WalkError {
            chain,
            failed_at: WalkTarget::at("Mainboard0", VersionRef::new(4, 0)),
            kind: WalkErrorKind::Ledger(LedgerError::Transport {
                message: "connection reset".into(),
            }),
        };
        assert_eq!(err.failed_version(), Some(VersionRef::new(4, 0)));
        assert!(!err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "Walk from IPhone0 failed at Mainboard0@4:0 after 0 step(s): \
             Ledger transport failed: connection reset"
        );
    }

    #[test]
    fn test_walk_error_into_top_level() {
        let err = WalkError {
            chain: LineageChain::new("CPU0"),
            failed_at: WalkTarget::latest("CPU0"),
            kind: WalkErrorKind::Cancelled,
        };
        let top: ProvtraceError = Box::new(err).into();
        assert!(matches!(top, ProvtraceError::Walk(ref e) if e.is_cancelled()));
    }
}
