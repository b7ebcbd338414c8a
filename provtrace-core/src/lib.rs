//! # provtrace Core
//!
//! Core library for reconstructing the provenance lineage of ledger assets.
//! Provides read/write set extraction, provenance decoding, dependency version
//! resolution, the backward chain walker, the ledger query capability,
//! selection policies, configuration, and fundamental types.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod ledger;
pub mod policy;
pub mod provenance;
pub mod resolver;
pub mod rwset;
pub mod types;
pub mod walker;

// Re-export commonly used types at the crate root.
pub use config::{DuplicatePolicy, TraceConfig, WalkConfig, config_exists, load_config};
pub use error::{
    ConfigError, DecodeError, ExtractError, LedgerError, ProvtraceError, Result, WalkError,
    WalkErrorKind,
};
pub use ledger::{InMemoryLedger, LedgerQueryClient, LedgerSnapshot};
pub use policy::{FollowKey, FollowPath, FollowSelf, Selection, SelectionPolicy, StopPolicy};
pub use provenance::{decode_provenance, provenance_key};
pub use resolver::{Resolution, resolve_dependencies};
pub use rwset::{ensure_valid, namespace_rwset};
pub use types::{
    Action, ChainStatus, DependencyEdge, KvRead, KvWrite, LineageChain, LineageStep,
    NamespaceRwSet, ProvenanceRecord, ReadWriteSet, TerminalReason, TransactionRecord,
    ValidationCode, VersionRef, WalkTarget,
};
pub use walker::{ChainWalker, WalkState, decode_step};
