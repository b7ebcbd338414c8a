//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use provtrace_core::fixtures::linear_lineage;
use provtrace_core::{
    Action, ChainWalker, DecodeError, DependencyEdge, DuplicatePolicy, ExtractError, KvRead,
    KvWrite, ProvenanceRecord, ReadWriteSet, Selection, TerminalReason, TransactionRecord,
    VersionRef, WalkConfig, decode_provenance, namespace_rwset, provenance_key,
    resolve_dependencies,
};
use std::sync::Arc;

fn asset_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["IPhone0", "Mainboard0", "CPU0", "ALU0", "Battery0"])
        .prop_map(String::from)
}

fn namespace_name() -> impl Strategy<Value = String> {
    "[a-z]{3,10}"
}

fn follow_first(_depth: usize, _asset: &str, edges: &[DependencyEdge]) -> Selection {
    edges
        .first()
        .map(|e| Selection::Follow(e.asset.clone()))
        .unwrap_or(Selection::Stop)
}

// --- Read/write set extraction properties ---

proptest! {
    #[test]
    fn multi_action_transactions_always_fail(
        actions in 2usize..6,
        index in 0usize..6,
        namespace in namespace_name(),
    ) {
        let mut tx = TransactionRecord::new(VersionRef::new(1, 0));
        for _ in 0..actions {
            tx = tx.with_action(Action::new().with_namespace(namespace.clone(), ReadWriteSet::new()));
        }
        let err = namespace_rwset(&tx, index, &namespace, DuplicatePolicy::FirstMatch).unwrap_err();
        prop_assert_eq!(err, ExtractError::MultipleActions { count: actions });
    }

    #[test]
    fn namespace_lookup_finds_only_present_namespaces(
        namespaces in prop::collection::btree_set(namespace_name(), 1..6),
        wanted in namespace_name(),
    ) {
        let mut action = Action::new();
        for ns in &namespaces {
            action = action.with_namespace(ns.clone(), ReadWriteSet::new().write(ns.clone(), "v"));
        }
        let tx = TransactionRecord::new(VersionRef::new(1, 0)).with_action(action);

        for ns in &namespaces {
            let rwset = namespace_rwset(&tx, 0, ns, DuplicatePolicy::Reject).unwrap();
            prop_assert_eq!(&rwset.writes[0].key, ns);
        }
        let result = namespace_rwset(&tx, 0, &wanted, DuplicatePolicy::FirstMatch);
        if namespaces.contains(&wanted) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(
                result.unwrap_err(),
                ExtractError::NamespaceNotFound { namespace: wanted.clone() }
            );
        }
    }
}

// --- Provenance decoding properties ---

proptest! {
    #[test]
    fn encoded_provenance_decodes_to_itself(
        func in "\\PC{0,24}",
        deps in prop::collection::vec(asset_name(), 0..6),
        asset in asset_name(),
    ) {
        let record = ProvenanceRecord::new(func, deps);
        let writes = vec![KvWrite::new(provenance_key(&asset), record.encode())];
        let decoded = decode_provenance(&writes, &asset, DuplicatePolicy::Reject).unwrap();
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn provenance_of_other_assets_is_never_decoded(
        asset in asset_name(),
        other in asset_name(),
    ) {
        prop_assume!(asset != other);
        let record = ProvenanceRecord::new("Init", Vec::<String>::new());
        let writes = vec![
            KvWrite::new(other.clone(), "{}"),
            KvWrite::new(provenance_key(&other), record.encode()),
        ];
        let err = decode_provenance(&writes, &asset, DuplicatePolicy::FirstMatch).unwrap_err();
        prop_assert_eq!(err, DecodeError::ProvenanceNotFound { asset });
    }
}

// --- Dependency resolution properties ---

proptest! {
    #[test]
    fn edge_count_is_number_of_key_matches(
        deps in prop::collection::vec(asset_name(), 0..6),
        reads in prop::collection::vec((asset_name(), 0u64..10, 0u64..4), 0..8),
    ) {
        let reads: Vec<KvRead> = reads
            .into_iter()
            .map(|(key, block, tx)| KvRead { key, version: VersionRef::new(block, tx) })
            .collect();
        let resolution = resolve_dependencies(&deps, &reads);

        let expected: usize = deps
            .iter()
            .map(|d| reads.iter().filter(|r| r.key == *d).count())
            .sum();
        prop_assert_eq!(resolution.edges.len(), expected);

        for edge in &resolution.edges {
            prop_assert!(deps.contains(&edge.asset));
            prop_assert!(reads.iter().any(|r| r.key == edge.asset && r.version == edge.version));
        }
        for gap in &resolution.gaps {
            prop_assert!(!reads.iter().any(|r| r.key == *gap));
        }
    }
}

// --- Walk properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn linear_lineage_walks_every_ancestor(depth in 1usize..12) {
        let walker = ChainWalker::new(Arc::new(linear_lineage(depth)), WalkConfig::default());
        let origin = format!("Part{}", depth - 1);

        let chain = tokio_test::block_on(walker.resolve_latest_lineage(&origin, &follow_first, 64))
            .unwrap();

        prop_assert_eq!(chain.len(), depth);
        prop_assert_eq!(chain.terminal_reason(), Some(&TerminalReason::NoDependencies));
        for (i, step) in chain.steps.iter().enumerate() {
            prop_assert_eq!(&step.asset, &format!("Part{}", depth - 1 - i));
        }
    }

    #[test]
    fn walk_never_exceeds_max_depth(depth in 1usize..12, max_depth in 1usize..12) {
        let walker = ChainWalker::new(Arc::new(linear_lineage(depth)), WalkConfig::default());
        let origin = format!("Part{}", depth - 1);

        let chain =
            tokio_test::block_on(walker.resolve_latest_lineage(&origin, &follow_first, max_depth))
                .unwrap();

        prop_assert_eq!(chain.len(), depth.min(max_depth));
        if depth > max_depth {
            prop_assert_eq!(
                chain.terminal_reason(),
                Some(&TerminalReason::MaxDepthReached { max_depth })
            );
        }
    }
}
