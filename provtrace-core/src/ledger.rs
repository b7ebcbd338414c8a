//! Ledger query capability.
//!
//! The walker never talks to a ledger network directly. It goes through
//! [`LedgerQueryClient`], which a deployment implements on top of its own
//! peer connection, identity and transport. [`InMemoryLedger`] is a complete
//! implementation over an in-process block map, loadable from a JSON snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::config::DEFAULT_NAMESPACE;
use crate::error::{LedgerError, ProvtraceError};
use crate::provenance::provenance_key;
use crate::types::{TransactionRecord, VersionRef};

/// Read-only queries the walker needs from a ledger.
///
/// Both calls may suspend and may fail with [`LedgerError::Transport`]; the
/// walker propagates such errors unchanged and never retries them.
#[async_trait]
pub trait LedgerQueryClient: Send + Sync {
    /// Fetch the transaction committed at `version`.
    async fn fetch_by_version(&self, version: VersionRef) -> Result<TransactionRecord, LedgerError>;

    /// Resolve the version of the most recent write to `asset`.
    async fn fetch_latest_version(&self, asset: &str) -> Result<VersionRef, LedgerError>;
}

/// Serialized form of an [`InMemoryLedger`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

/// A ledger held in memory, block by block.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    namespace: String,
    blocks: BTreeMap<u64, Vec<TransactionRecord>>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            blocks: BTreeMap::new(),
        }
    }

    /// Use `namespace` when looking up an asset's latest provenance write.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Append a committed transaction, keeping each block ordered by index.
    pub fn push_transaction(&mut self, tx: TransactionRecord) {
        let block = self.blocks.entry(tx.block_num).or_default();
        let pos = block.partition_point(|t| t.tx_num < tx.tx_num);
        if block.get(pos).is_some_and(|t| t.tx_num == tx.tx_num) {
            block[pos] = tx;
        } else {
            block.insert(pos, tx);
        }
    }

    pub fn with_transaction(mut self, tx: TransactionRecord) -> Self {
        self.push_transaction(tx);
        self
    }

    pub fn transaction_count(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    pub fn block_height(&self) -> Option<u64> {
        self.blocks.keys().next_back().copied()
    }

    /// Iterate over every transaction in ledger order.
    pub fn transactions(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.blocks.values().flatten()
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let mut ledger = Self::new();
        if let Some(namespace) = snapshot.namespace {
            ledger.namespace = namespace;
        }
        for tx in snapshot.transactions {
            ledger.push_transaction(tx);
        }
        ledger
    }

    pub fn to_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            namespace: Some(self.namespace.clone()),
            transactions: self.transactions().cloned().collect(),
        }
    }

    /// Load a JSON snapshot file (`{"transactions": [...]}`).
    pub fn load_snapshot(path: &Path) -> Result<Self, ProvtraceError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&content)?;
        let ledger = Self::from_snapshot(snapshot);
        debug!(
            path = %path.display(),
            transactions = ledger.transaction_count(),
            "Loaded ledger snapshot"
        );
        Ok(ledger)
    }

    /// Look a transaction up by its ledger-assigned id.
    pub fn fetch_by_tx_id(&self, tx_id: &str) -> Result<&TransactionRecord, LedgerError> {
        self.transactions()
            .find(|tx| tx.tx_id.as_deref() == Some(tx_id))
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("transaction id {tx_id}"),
            })
    }

    fn lookup(&self, version: VersionRef) -> Result<&TransactionRecord, LedgerError> {
        let block = self
            .blocks
            .get(&version.block_num)
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("block {}", version.block_num),
            })?;
        if let Some(tx) = block.iter().find(|t| t.tx_num == version.tx_num) {
            return Ok(tx);
        }
        if version.tx_num >= block.len() as u64 {
            Err(LedgerError::TransactionIndexOutOfRange {
                block_num: version.block_num,
                tx_num: version.tx_num,
                tx_count: block.len(),
            })
        } else {
            Err(LedgerError::NotFound {
                what: format!("transaction {version}"),
            })
        }
    }

    fn writes_provenance(&self, tx: &TransactionRecord, key: &str) -> bool {
        tx.actions
            .iter()
            .flat_map(|a| &a.ns_rwsets)
            .filter(|ns| ns.namespace == self.namespace)
            .flat_map(|ns| &ns.rwset.writes)
            .any(|w| w.key == key && !w.is_delete)
    }
}

#[async_trait]
impl LedgerQueryClient for InMemoryLedger {
    async fn fetch_by_version(&self, version: VersionRef) -> Result<TransactionRecord, LedgerError> {
        self.lookup(version).cloned()
    }

    async fn fetch_latest_version(&self, asset: &str) -> Result<VersionRef, LedgerError> {
        let key = provenance_key(asset);
        self.transactions()
            .filter(|tx| tx.validation_code.is_valid())
            .filter(|tx| self.writes_provenance(tx, &key))
            .map(TransactionRecord::version)
            .max()
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("latest write of {asset}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ProvenanceRecord, ReadWriteSet, ValidationCode};

    fn prov_tx(block: u64, tx: u64, asset: &str) -> TransactionRecord {
        let record = ProvenanceRecord::new("Make", Vec::<String>::new());
        TransactionRecord::new(VersionRef::new(block, tx)).with_action(Action::new().with_namespace(
            "supplychain",
            ReadWriteSet::new()
                .write(asset, "{}")
                .write(provenance_key(asset), record.encode()),
        ))
    }

    #[tokio::test]
    async fn test_fetch_by_version() {
        let ledger = InMemoryLedger::new()
            .with_transaction(prov_tx(2, 1, "CPU0"))
            .with_transaction(prov_tx(2, 0, "ALU0"));
        let tx = ledger.fetch_by_version(VersionRef::new(2, 1)).await.unwrap();
        assert_eq!(tx.version(), VersionRef::new(2, 1));
        assert_eq!(ledger.transaction_count(), 2);
        assert_eq!(ledger.block_height(), Some(2));
    }

    #[test]
    fn test_fetch_by_tx_id() {
        let ledger = InMemoryLedger::new()
            .with_transaction(prov_tx(2, 0, "ALU0").with_tx_id("a1f0"))
            .with_transaction(prov_tx(3, 0, "CPU0").with_tx_id("c3d2"));
        let tx = ledger.fetch_by_tx_id("c3d2").unwrap();
        assert_eq!(tx.version(), VersionRef::new(3, 0));
        assert_eq!(
            ledger.fetch_by_tx_id("ffff").unwrap_err(),
            LedgerError::NotFound {
                what: "transaction id ffff".into()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_unknown_block() {
        let ledger = InMemoryLedger::new().with_transaction(prov_tx(2, 0, "ALU0"));
        let err = ledger.fetch_by_version(VersionRef::new(9, 0)).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::NotFound {
                what: "block 9".into()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_index_past_block() {
        let ledger = InMemoryLedger::new().with_transaction(prov_tx(2, 0, "ALU0"));
        let err = ledger.fetch_by_version(VersionRef::new(2, 4)).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::TransactionIndexOutOfRange {
                block_num: 2,
                tx_num: 4,
                tx_count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_latest_version_picks_highest_valid_write() {
        let ledger = InMemoryLedger::new()
            .with_transaction(prov_tx(3, 0, "CPU0"))
            .with_transaction(prov_tx(5, 1, "CPU0"))
            .with_transaction(
                prov_tx(7, 0, "CPU0").with_validation_code(ValidationCode::Invalid(11)),
            )
            .with_transaction(prov_tx(8, 0, "ALU0"));
        let latest = ledger.fetch_latest_version("CPU0").await.unwrap();
        assert_eq!(latest, VersionRef::new(5, 1));
    }

    #[tokio::test]
    async fn test_latest_version_respects_namespace() {
        let ledger = InMemoryLedger::new()
            .with_namespace("other_cc")
            .with_transaction(prov_tx(3, 0, "CPU0"));
        assert!(matches!(
            ledger.fetch_latest_version("CPU0").await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_push_replaces_same_index() {
        let mut ledger = InMemoryLedger::new();
        ledger.push_transaction(prov_tx(1, 0, "ALU0"));
        ledger.push_transaction(prov_tx(1, 0, "ALU1"));
        assert_eq!(ledger.transaction_count(), 1);
        assert_eq!(ledger.fetch_latest_version("ALU1").await.unwrap(), VersionRef::new(1, 0));
    }

    #[test]
    fn test_snapshot_roundtrip_file() {
        let ledger = InMemoryLedger::new()
            .with_transaction(prov_tx(1, 0, "ALU0"))
            .with_transaction(prov_tx(2, 0, "CPU0").with_tx_id("abc123"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, serde_json::to_string_pretty(&ledger.to_snapshot()).unwrap()).unwrap();

        let loaded = InMemoryLedger::load_snapshot(&path).unwrap();
        assert_eq!(loaded.transaction_count(), 2);
        assert_eq!(loaded.namespace(), "supplychain");
        let txs: Vec<_> = loaded.transactions().collect();
        assert_eq!(txs[1].tx_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_load_snapshot_missing_file() {
        let err = InMemoryLedger::load_snapshot(Path::new("/nonexistent/ledger.json")).unwrap_err();
        assert!(matches!(err, ProvtraceError::Io(_)));
    }
}
