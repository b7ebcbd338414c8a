//! Sample ledgers for tests, demos and the CLI `sample` command.
//!
//! [`supply_chain_ledger`] records a phone assembly line: raw parts are
//! minted in block 1, combined into a CPU, a camera and a mainboard, assembled
//! into a phone, procured by a retailer and finally purchased.

use crate::ledger::InMemoryLedger;
use crate::provenance::provenance_key;
use crate::types::{Action, ProvenanceRecord, ReadWriteSet, TransactionRecord, VersionRef};

const NAMESPACE: &str = "supplychain";

/// Raw parts minted by the init transaction at block 1.
pub const RAW_PARTS: &[&str] = &[
    "FrontCam0",
    "BackCam0",
    "ALU0",
    "ControlUnit0",
    "Register0",
    "Register1",
    "Memory0",
    "SSD0",
    "Battery0",
    "BankAccount0",
];

/// One fabricated transaction: the produced asset, the producing function and
/// the (dependency, version) pairs it read.
struct Production<'a> {
    at: VersionRef,
    asset: &'a str,
    func: &'a str,
    reads: &'a [(&'a str, VersionRef)],
}

impl Production<'_> {
    fn into_transaction(self) -> TransactionRecord {
        let deps: Vec<&str> = self.reads.iter().map(|(key, _)| *key).collect();
        let record = ProvenanceRecord::new(self.func, deps);

        let mut rwset = ReadWriteSet::new();
        for (key, version) in self.reads {
            rwset = rwset.read(*key, *version);
        }
        let rwset = rwset
            .write(self.asset, format!(r#"{{"SerialID":"{}"}}"#, self.asset))
            .write(provenance_key(self.asset), record.encode());

        TransactionRecord::new(self.at)
            .with_tx_id(format!("tx-{}-{}", self.at.block_num, self.at.tx_num))
            .with_action(Action::new().with_namespace(NAMESPACE, rwset))
    }
}

fn init_transaction() -> TransactionRecord {
    let init = ProvenanceRecord::new("Init", Vec::<String>::new());
    let mut rwset = ReadWriteSet::new();
    for part in RAW_PARTS {
        rwset = rwset
            .write(*part, format!(r#"{{"SerialID":"{part}","Used":false}}"#))
            .write(provenance_key(part), init.encode());
    }
    TransactionRecord::new(VersionRef::new(1, 0))
        .with_tx_id("tx-1-0")
        .with_action(
            Action::new()
                .with_namespace("lscc", ReadWriteSet::new().read(NAMESPACE, VersionRef::new(0, 0)))
                .with_namespace(NAMESPACE, rwset),
        )
}

/// The phone assembly ledger.
///
/// | block | function      | produces   | reads                                   |
/// |-------|---------------|------------|-----------------------------------------|
/// | 1     | Init          | raw parts  | -                                       |
/// | 2     | MakeCPU       | CPU0       | ALU0, ControlUnit0, Register0, Register1 |
/// | 3     | MakeCamera    | Camera0    | FrontCam0, BackCam0                     |
/// | 4     | MakeMainboard | Mainboard0 | CPU0, Memory0, SSD0                     |
/// | 5     | Assemble      | IPhone0    | Camera0, Battery0, Mainboard0           |
/// | 6     | Procure       | IPhone0    | IPhone0                                 |
/// | 7     | Purchase      | IPhone0    | IPhone0, BankAccount0                   |
pub fn supply_chain_ledger() -> InMemoryLedger {
    let raw = VersionRef::new(1, 0);
    let productions = [
        Production {
            at: VersionRef::new(2, 0),
            asset: "CPU0",
            func: "MakeCPU",
            reads: &[
                ("ALU0", raw),
                ("ControlUnit0", raw),
                ("Register0", raw),
                ("Register1", raw),
            ],
        },
        Production {
            at: VersionRef::new(3, 0),
            asset: "Camera0",
            func: "MakeCamera",
            reads: &[("FrontCam0", raw), ("BackCam0", raw)],
        },
        Production {
            at: VersionRef::new(4, 0),
            asset: "Mainboard0",
            func: "MakeMainboard",
            reads: &[
                ("CPU0", VersionRef::new(2, 0)),
                ("Memory0", raw),
                ("SSD0", raw),
            ],
        },
        Production {
            at: VersionRef::new(5, 0),
            asset: "IPhone0",
            func: "Assemble",
            reads: &[
                ("Camera0", VersionRef::new(3, 0)),
                ("Battery0", raw),
                ("Mainboard0", VersionRef::new(4, 0)),
            ],
        },
        Production {
            at: VersionRef::new(6, 0),
            asset: "IPhone0",
            func: "Procure",
            reads: &[("IPhone0", VersionRef::new(5, 0))],
        },
        Production {
            at: VersionRef::new(7, 0),
            asset: "IPhone0",
            func: "Purchase",
            reads: &[("IPhone0", VersionRef::new(6, 0)), ("BankAccount0", raw)],
        },
    ];

    let mut ledger = InMemoryLedger::new()
        .with_namespace(NAMESPACE)
        .with_transaction(init_transaction());
    for production in productions {
        ledger.push_transaction(production.into_transaction());
    }
    ledger
}

/// A single-dependency lineage of `depth` assets: `Part{n}` (block `n + 1`)
/// is produced from `Part{n-1}`, and `Part0` is raw material.
pub fn linear_lineage(depth: usize) -> InMemoryLedger {
    let mut ledger = InMemoryLedger::new().with_namespace(NAMESPACE);
    let names: Vec<String> = (0..depth).map(|n| format!("Part{n}")).collect();
    for (n, name) in names.iter().enumerate() {
        let at = VersionRef::new(n as u64 + 1, 0);
        let prev = n.checked_sub(1).map(|p| (names[p].as_str(), VersionRef::new(p as u64 + 1, 0)));
        let reads: Vec<(&str, VersionRef)> = prev.into_iter().collect();
        let func = if n == 0 { "Init" } else { "Refine" };
        ledger.push_transaction(
            Production {
                at,
                asset: name,
                func,
                reads: &reads,
            }
            .into_transaction(),
        );
    }
    ledger
}
