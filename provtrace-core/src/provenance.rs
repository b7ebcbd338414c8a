//! Provenance record decoding.
//!
//! Chaincodes with provenance tracking enabled write a JSON note under
//! `<asset>_prov` whenever they mutate `<asset>`. The note names the producing
//! function (`FuncName`) and the assets it read (`DepReads`).

use crate::config::DuplicatePolicy;
use crate::error::DecodeError;
use crate::types::{KvWrite, ProvenanceRecord};

/// Suffix appended to an asset key to form its provenance key.
pub const PROVENANCE_SUFFIX: &str = "_prov";

/// The write key that holds provenance for `asset`.
pub fn provenance_key(asset: &str) -> String {
    format!("{asset}{PROVENANCE_SUFFIX}")
}

/// Find and decode the provenance record for `asset` in a write set.
///
/// Writes are scanned in ledger order and the first match wins unless
/// `duplicates` is [`DuplicatePolicy::Reject`].
pub fn decode_provenance(
    writes: &[KvWrite],
    asset: &str,
    duplicates: DuplicatePolicy,
) -> Result<ProvenanceRecord, DecodeError> {
    let key = provenance_key(asset);
    let mut matches = writes.iter().filter(|w| w.key == key);

    let write = matches
        .next()
        .ok_or_else(|| DecodeError::ProvenanceNotFound {
            asset: asset.to_string(),
        })?;

    if duplicates == DuplicatePolicy::Reject {
        let extra = matches.count();
        if extra > 0 {
            return Err(DecodeError::DuplicateProvenance {
                asset: asset.to_string(),
                count: extra + 1,
            });
        }
    }

    parse_record(&write.value).map_err(|reason| DecodeError::MalformedProvenance {
        asset: asset.to_string(),
        reason,
    })
}

fn parse_record(value: &str) -> Result<ProvenanceRecord, String> {
    let json: serde_json::Value = serde_json::from_str(value).map_err(|e| e.to_string())?;
    if !json.is_object() {
        return Err(format!("expected a JSON object, got {}", kind_of(&json)));
    }
    // An explicit null dependency list is the same as an absent one.
    let mut json = json;
    if json.get("DepReads").is_some_and(|v| v.is_null()) {
        if let Some(obj) = json.as_object_mut() {
            obj.remove("DepReads");
        }
    }
    serde_json::from_value(json).map_err(|e| e.to_string())
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl ProvenanceRecord {
    /// Serialize to the on-ledger JSON form.
    pub fn encode(&self) -> String {
        // A struct of strings cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prov_write(asset: &str, value: &str) -> KvWrite {
        KvWrite::new(provenance_key(asset), value)
    }

    #[test]
    fn test_provenance_key() {
        assert_eq!(provenance_key("IPhone0"), "IPhone0_prov");
    }

    #[test]
    fn test_decode_chaincode_format() {
        let writes = vec![
            KvWrite::new("IPhone0", r#"{"SerialID":"IPhone0","Owner":"Foxconn"}"#),
            prov_write(
                "IPhone0",
                r#"{"FuncName":"Assemble","DepReads":["Camera0","Battery0","Mainboard0"],"TxID":"d54c"}"#,
            ),
        ];
        let record = decode_provenance(&writes, "IPhone0", DuplicatePolicy::FirstMatch).unwrap();
        assert_eq!(record.func_name, "Assemble");
        assert_eq!(record.dep_reads, vec!["Camera0", "Battery0", "Mainboard0"]);
        assert_eq!(record.tx_id.as_deref(), Some("d54c"));
    }

    #[test]
    fn test_missing_provenance_key() {
        let writes = vec![KvWrite::new("IPhone0", "{}")];
        let err = decode_provenance(&writes, "IPhone0", DuplicatePolicy::FirstMatch).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ProvenanceNotFound {
                asset: "IPhone0".into()
            }
        );
    }

    #[test]
    fn test_missing_dep_reads_is_empty() {
        let writes = vec![prov_write("ALU0", r#"{"FuncName":"Init"}"#)];
        let record = decode_provenance(&writes, "ALU0", DuplicatePolicy::FirstMatch).unwrap();
        assert!(record.dep_reads.is_empty());

        let writes = vec![prov_write("ALU0", r#"{"FuncName":"Init","DepReads":null}"#)];
        let record = decode_provenance(&writes, "ALU0", DuplicatePolicy::FirstMatch).unwrap();
        assert!(record.dep_reads.is_empty());
    }

    #[test]
    fn test_missing_func_name_is_malformed() {
        let writes = vec![prov_write("CPU0", r#"{"DepReads":["ALU0"]}"#)];
        let err = decode_provenance(&writes, "CPU0", DuplicatePolicy::FirstMatch).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedProvenance { ref asset, .. } if asset == "CPU0"));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let writes = vec![prov_write("CPU0", "100")];
        let err = decode_provenance(&writes, "CPU0", DuplicatePolicy::FirstMatch).unwrap_err();
        match err {
            DecodeError::MalformedProvenance { reason, .. } => {
                assert_eq!(reason, "expected a JSON object, got a number");
            }
            e => panic!("Expected MalformedProvenance, got: {e:?}"),
        }

        let writes = vec![prov_write("CPU0", "not json")];
        assert!(matches!(
            decode_provenance(&writes, "CPU0", DuplicatePolicy::FirstMatch),
            Err(DecodeError::MalformedProvenance { .. })
        ));
    }

    #[test]
    fn test_first_match_wins() {
        let writes = vec![
            prov_write("CPU0", r#"{"FuncName":"MakeCPU"}"#),
            prov_write("CPU0", r#"{"FuncName":"Other"}"#),
        ];
        let record = decode_provenance(&writes, "CPU0", DuplicatePolicy::FirstMatch).unwrap();
        assert_eq!(record.func_name, "MakeCPU");

        let err = decode_provenance(&writes, "CPU0", DuplicatePolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            DecodeError::DuplicateProvenance {
                asset: "CPU0".into(),
                count: 2
            }
        );
    }

    #[test]
    fn test_prefix_keys_do_not_match() {
        let writes = vec![prov_write("CPU01", r#"{"FuncName":"MakeCPU"}"#)];
        assert!(matches!(
            decode_provenance(&writes, "CPU0", DuplicatePolicy::FirstMatch),
            Err(DecodeError::ProvenanceNotFound { .. })
        ));
    }

    #[test]
    fn test_encode_keeps_duplicates_and_order() {
        let record = ProvenanceRecord::new("Procure", ["IPhone0", "IPhone0", "Retailer"]);
        let writes = vec![prov_write("IPhone0", &record.encode())];
        let decoded = decode_provenance(&writes, "IPhone0", DuplicatePolicy::FirstMatch).unwrap();
        assert_eq!(decoded, record);
    }
}
