//! Dependency version resolution.
//!
//! Pairs each dependency declared in a provenance record with the version the
//! same transaction read for it.

use serde::{Deserialize, Serialize};

use crate::types::{DependencyEdge, KvRead};

/// Edges resolved from one provenance record, plus the declared dependencies
/// that had no matching read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub edges: Vec<DependencyEdge>,
    pub gaps: Vec<String>,
}

impl Resolution {
    /// First edge for `asset` in resolution order.
    pub fn first_edge_for(&self, asset: &str) -> Option<&DependencyEdge> {
        first_edge_for(&self.edges, asset)
    }

    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }
}

/// First edge for `asset` in a resolved edge list.
pub fn first_edge_for<'a>(edges: &'a [DependencyEdge], asset: &str) -> Option<&'a DependencyEdge> {
    edges.iter().find(|e| e.asset == asset)
}

/// Resolve every declared dependency against the read set.
///
/// Each (dependency, read) pair with equal keys yields one edge, so duplicate
/// declarations and repeated reads both multiply. Dependencies with no
/// matching read are reported in [`Resolution::gaps`].
pub fn resolve_dependencies(dep_reads: &[String], reads: &[KvRead]) -> Resolution {
    let mut resolution = Resolution::default();
    for dep in dep_reads {
        let before = resolution.edges.len();
        resolution.edges.extend(
            reads
                .iter()
                .filter(|r| r.key == *dep)
                .map(|r| DependencyEdge::new(dep.clone(), r.version)),
        );
        if resolution.edges.len() == before {
            resolution.gaps.push(dep.clone());
        }
    }
    resolution
}
