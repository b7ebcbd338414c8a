//! Core data types for provtrace.
//!
//! Everything here is a read-only view of data already committed to the
//! ledger: transactions, their per-namespace read/write sets, the provenance
//! records embedded in them, and the lineage assembled by a walk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate of a committed write: the block number and the transaction's
/// index inside that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionRef {
    pub block_num: u64,
    pub tx_num: u64,
}

impl VersionRef {
    pub fn new(block_num: u64, tx_num: u64) -> Self {
        Self { block_num, tx_num }
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_num, self.tx_num)
    }
}

/// Validation verdict the ledger attached to a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ValidationCode {
    #[default]
    Valid,
    Invalid(i32),
}

impl ValidationCode {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationCode::Valid)
    }

    pub fn code(&self) -> i32 {
        match self {
            ValidationCode::Valid => 0,
            ValidationCode::Invalid(code) => *code,
        }
    }
}

impl From<i32> for ValidationCode {
    fn from(code: i32) -> Self {
        if code == 0 {
            ValidationCode::Valid
        } else {
            ValidationCode::Invalid(code)
        }
    }
}

impl From<ValidationCode> for i32 {
    fn from(code: ValidationCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationCode::Valid => write!(f, "valid"),
            ValidationCode::Invalid(code) => write!(f, "invalid ({code})"),
        }
    }
}

/// A key read during simulation, together with the version that was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvRead {
    pub key: String,
    pub version: VersionRef,
}

/// A key written by the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_delete: bool,
}

impl KvWrite {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_delete: false,
        }
    }
}

/// Reads and writes of one chaincode namespace, both in ledger order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWriteSet {
    #[serde(default)]
    pub reads: Vec<KvRead>,
    #[serde(default)]
    pub writes: Vec<KvWrite>,
}

impl ReadWriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read of `key` at `version`.
    pub fn read(mut self, key: impl Into<String>, version: VersionRef) -> Self {
        self.reads.push(KvRead {
            key: key.into(),
            version,
        });
        self
    }

    /// Record a write of `value` under `key`.
    pub fn write(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.writes.push(KvWrite::new(key, value));
        self
    }
}

/// A namespace label paired with its read/write set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRwSet {
    pub namespace: String,
    pub rwset: ReadWriteSet,
}

/// Effects of a single chaincode invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub ns_rwsets: Vec<NamespaceRwSet>,
}

impl Action {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>, rwset: ReadWriteSet) -> Self {
        self.ns_rwsets.push(NamespaceRwSet {
            namespace: namespace.into(),
            rwset,
        });
        self
    }
}

/// A committed ledger transaction as returned by the query collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub block_num: u64,
    pub tx_num: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub validation_code: ValidationCode,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl TransactionRecord {
    pub fn new(version: VersionRef) -> Self {
        Self {
            block_num: version.block_num,
            tx_num: version.tx_num,
            tx_id: None,
            validation_code: ValidationCode::Valid,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_validation_code(mut self, code: ValidationCode) -> Self {
        self.validation_code = code;
        self
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = Some(tx_id.into());
        self
    }

    pub fn version(&self) -> VersionRef {
        VersionRef::new(self.block_num, self.tx_num)
    }
}

/// Provenance note stored under `<asset>_prov`.
///
/// Field names follow the chaincode's JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    #[serde(rename = "FuncName")]
    pub func_name: String,
    #[serde(rename = "DepReads", default)]
    pub dep_reads: Vec<String>,
    #[serde(rename = "TxID", default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

impl ProvenanceRecord {
    pub fn new<I, S>(func_name: impl Into<String>, dep_reads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            func_name: func_name.into(),
            dep_reads: dep_reads.into_iter().map(Into::into).collect(),
            tx_id: None,
        }
    }
}

/// A declared dependency resolved to the exact version read in the same
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub asset: String,
    pub version: VersionRef,
}

impl DependencyEdge {
    pub fn new(asset: impl Into<String>, version: VersionRef) -> Self {
        Self {
            asset: asset.into(),
            version,
        }
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.asset, self.version)
    }
}

/// How a walk step addresses the transaction to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum WalkTarget {
    /// Resolve the asset's most recent write first.
    Latest { asset: String },
    /// Fetch an exact version directly.
    At { asset: String, version: VersionRef },
}

impl WalkTarget {
    pub fn latest(asset: impl Into<String>) -> Self {
        WalkTarget::Latest {
            asset: asset.into(),
        }
    }

    pub fn at(asset: impl Into<String>, version: VersionRef) -> Self {
        WalkTarget::At {
            asset: asset.into(),
            version,
        }
    }

    pub fn asset(&self) -> &str {
        match self {
            WalkTarget::Latest { asset } | WalkTarget::At { asset, .. } => asset,
        }
    }

    /// The exact version addressed, if already known.
    pub fn version(&self) -> Option<VersionRef> {
        match self {
            WalkTarget::Latest { .. } => None,
            WalkTarget::At { version, .. } => Some(*version),
        }
    }
}

impl From<&DependencyEdge> for WalkTarget {
    fn from(edge: &DependencyEdge) -> Self {
        WalkTarget::at(edge.asset.clone(), edge.version)
    }
}

impl fmt::Display for WalkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkTarget::Latest { asset } => write!(f, "{asset}@latest"),
            WalkTarget::At { asset, version } => write!(f, "{asset}@{version}"),
        }
    }
}

/// One hop of a lineage walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageStep {
    pub asset: String,
    pub version: VersionRef,
    pub provenance: ProvenanceRecord,
    pub edges: Vec<DependencyEdge>,
    /// Declared dependencies with no matching read in this transaction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<String>,
    /// The edge the walk followed out of this step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed: Option<DependencyEdge>,
    /// Time spent fetching and decoding this hop.
    pub elapsed_ms: u64,
}

/// Why a walk stopped without an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum TerminalReason {
    /// The last step resolved no dependency edges (raw material).
    NoDependencies,
    /// The selection policy chose to stop.
    PolicyStopped,
    /// The policy named a dependency that has no edge in the last step.
    NoMatchingEdge { target: String },
    /// The configured maximum number of steps was reached.
    MaxDepthReached { max_depth: usize },
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalReason::NoDependencies => write!(f, "no further dependencies"),
            TerminalReason::PolicyStopped => write!(f, "stopped by selection policy"),
            TerminalReason::NoMatchingEdge { target } => {
                write!(f, "no resolved dependency edge for '{target}'")
            }
            TerminalReason::MaxDepthReached { max_depth } => {
                write!(f, "maximum depth of {max_depth} steps reached")
            }
        }
    }
}

/// Final state of a lineage chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    InProgress,
    Terminal(TerminalReason),
    Cancelled,
    Failed,
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::InProgress => write!(f, "in progress"),
            ChainStatus::Terminal(reason) => write!(f, "complete: {reason}"),
            ChainStatus::Cancelled => write!(f, "cancelled"),
            ChainStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Ordered sequence of steps visited by one walk, newest version first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageChain {
    pub origin: String,
    pub steps: Vec<LineageStep>,
    pub status: ChainStatus,
}

impl LineageChain {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            steps: Vec::new(),
            status: ChainStatus::InProgress,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&LineageStep> {
        self.steps.last()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ChainStatus::Cancelled
    }

    pub fn terminal_reason(&self) -> Option<&TerminalReason> {
        match &self.status {
            ChainStatus::Terminal(reason) => Some(reason),
            _ => None,
        }
    }

    /// Asset identifiers visited, in walk order.
    pub fn assets(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.asset.as_str()).collect()
    }
}
