//! Namespace-scoped read/write set extraction.
//!
//! A transaction carries one read/write set per chaincode namespace it touched.
//! Only single-action transactions are supported: anything else is rejected
//! rather than guessed at.

use crate::config::DuplicatePolicy;
use crate::error::ExtractError;
use crate::types::{ReadWriteSet, TransactionRecord};

/// Return the read/write set that `namespace` contributed to the selected
/// action of `tx`.
pub fn namespace_rwset<'a>(
    tx: &'a TransactionRecord,
    action_index: usize,
    namespace: &str,
    duplicates: DuplicatePolicy,
) -> Result<&'a ReadWriteSet, ExtractError> {
    let count = tx.actions.len();
    if count != 1 {
        return Err(ExtractError::MultipleActions { count });
    }
    let action = tx
        .actions
        .get(action_index)
        .ok_or(ExtractError::ActionIndexOutOfRange {
            index: action_index,
            count,
        })?;

    let mut matches = action
        .ns_rwsets
        .iter()
        .filter(|ns| ns.namespace == namespace);

    let first = matches
        .next()
        .ok_or_else(|| ExtractError::NamespaceNotFound {
            namespace: namespace.to_string(),
        })?;

    if duplicates == DuplicatePolicy::Reject {
        let extra = matches.count();
        if extra > 0 {
            return Err(ExtractError::DuplicateNamespace {
                namespace: namespace.to_string(),
                count: extra + 1,
            });
        }
    }

    Ok(&first.rwset)
}

/// Fail unless the ledger marked `tx` as valid.
pub fn ensure_valid(tx: &TransactionRecord) -> Result<(), ExtractError> {
    if tx.validation_code.is_valid() {
        Ok(())
    } else {
        Err(ExtractError::InvalidTransaction {
            version: tx.version(),
            code: tx.validation_code.code(),
        })
    }
}
