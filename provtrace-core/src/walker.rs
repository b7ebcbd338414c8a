//! Backward lineage walk.
//!
//! A walk starts at one asset version and repeatedly fetches the transaction
//! that produced it, decodes its provenance, resolves the dependency versions
//! it read, and asks a [`SelectionPolicy`] which dependency to follow next.
//!
//! The walk is an explicit state machine:
//!
//! ```text
//! Start -> Querying -> Decoded -> Advancing -> Querying -> ... -> Terminal
//!              |           |
//!              +-----------+--> Failed
//! ```
//!
//! Steps are strictly sequential. Independent walks (including sibling
//! branches of one lineage, see [`ChainWalker::resolve_branches`]) share
//! nothing but the ledger client and may run concurrently.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WalkConfig;
use crate::error::{LedgerError, WalkError, WalkErrorKind};
use crate::ledger::LedgerQueryClient;
use crate::policy::{Selection, SelectionPolicy, StopPolicy};
use crate::provenance::decode_provenance;
use crate::resolver::{Resolution, first_edge_for, resolve_dependencies};
use crate::rwset::{ensure_valid, namespace_rwset};
use crate::types::{
    ChainStatus, DependencyEdge, LineageChain, LineageStep, ProvenanceRecord, TerminalReason,
    TransactionRecord, VersionRef, WalkTarget,
};

/// States of a single walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    Start(WalkTarget),
    Querying(WalkTarget),
    Decoded(Box<LineageStep>),
    Advancing(DependencyEdge),
    Terminal(TerminalReason),
    Failed {
        at: WalkTarget,
        kind: WalkErrorKind,
    },
}

impl WalkState {
    pub fn name(&self) -> &'static str {
        match self {
            WalkState::Start(_) => "start",
            WalkState::Querying(_) => "querying",
            WalkState::Decoded(_) => "decoded",
            WalkState::Advancing(_) => "advancing",
            WalkState::Terminal(_) => "terminal",
            WalkState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode one fetched transaction for `asset`: extract the namespace's
/// read/write set, decode the provenance record and resolve its dependencies.
pub fn decode_step(
    tx: &TransactionRecord,
    asset: &str,
    config: &WalkConfig,
) -> Result<(ProvenanceRecord, Resolution), WalkErrorKind> {
    if config.require_valid_transactions {
        ensure_valid(tx)?;
    }
    let rwset = namespace_rwset(tx, 0, &config.namespace, config.duplicate_policy)?;
    let provenance = decode_provenance(&rwset.writes, asset, config.duplicate_policy)?;
    let resolution = resolve_dependencies(&provenance.dep_reads, &rwset.reads);
    Ok((provenance, resolution))
}

/// Drives lineage walks against a ledger client.
#[derive(Clone)]
pub struct ChainWalker {
    client: Arc<dyn LedgerQueryClient>,
    config: WalkConfig,
    cancellation: CancellationToken,
}

impl fmt::Debug for ChainWalker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainWalker")
            .field("config", &self.config)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ChainWalker {
    pub fn new(client: Arc<dyn LedgerQueryClient>, config: WalkConfig) -> Self {
        Self {
            client,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Get the cancellation token observed by this walker.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Cancel every walk running on this walker.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Walk back from the latest version of `asset`.
    pub async fn resolve_latest_lineage(
        &self,
        asset: &str,
        policy: &dyn SelectionPolicy,
        max_depth: usize,
    ) -> Result<LineageChain, Box<WalkError>> {
        self.walk(WalkTarget::latest(asset), policy, max_depth).await
    }

    /// Walk back from an explicit version of `asset`.
    pub async fn resolve_lineage_at(
        &self,
        asset: &str,
        version: VersionRef,
        policy: &dyn SelectionPolicy,
        max_depth: usize,
    ) -> Result<LineageChain, Box<WalkError>> {
        self.walk(WalkTarget::at(asset, version), policy, max_depth)
            .await
    }

    /// Decode a single hop without following anything.
    pub async fn inspect_step(&self, target: WalkTarget) -> Result<LineageStep, Box<WalkError>> {
        let mut chain = self.walk(target.clone(), &StopPolicy, 1).await?;
        chain.steps.pop().ok_or_else(|| {
            Box::new(WalkError {
                chain: LineageChain::new(target.asset()),
                failed_at: target,
                kind: WalkErrorKind::InvalidDepth,
            })
        })
    }

    /// Walk each edge as an independent chain, concurrently.
    ///
    /// Results come back in edge order. Every branch starts at depth zero of
    /// the shared policy.
    pub async fn resolve_branches(
        &self,
        edges: &[DependencyEdge],
        policy: &dyn SelectionPolicy,
        max_depth: usize,
    ) -> Vec<Result<LineageChain, Box<WalkError>>> {
        let walks = edges
            .iter()
            .map(|edge| self.walk(WalkTarget::from(edge), policy, max_depth));
        futures::future::join_all(walks).await
    }

    /// Run the walk state machine from `target`.
    pub async fn walk(
        &self,
        target: WalkTarget,
        policy: &dyn SelectionPolicy,
        max_depth: usize,
    ) -> Result<LineageChain, Box<WalkError>> {
        let mut chain = LineageChain::new(target.asset());
        let mut state = WalkState::Start(target);

        loop {
            debug!(origin = %chain.origin, steps = chain.len(), state = %state, "Walk state");
            state = match state {
                WalkState::Start(target) => {
                    if max_depth == 0 {
                        WalkState::Failed {
                            at: target,
                            kind: WalkErrorKind::InvalidDepth,
                        }
                    } else {
                        WalkState::Querying(target)
                    }
                }
                WalkState::Querying(target) => {
                    if self.cancellation.is_cancelled() {
                        WalkState::Failed {
                            at: target,
                            kind: WalkErrorKind::Cancelled,
                        }
                    } else {
                        match self.query(&target).await {
                            Ok(step) => WalkState::Decoded(Box::new(step)),
                            Err((at, kind)) => WalkState::Failed { at, kind },
                        }
                    }
                }
                WalkState::Decoded(step) => self.decide(&mut chain, *step, policy, max_depth),
                WalkState::Advancing(edge) => WalkState::Querying(WalkTarget::from(&edge)),
                WalkState::Terminal(reason) => {
                    info!(
                        origin = %chain.origin,
                        steps = chain.len(),
                        reason = %reason,
                        "Lineage walk complete"
                    );
                    chain.status = ChainStatus::Terminal(reason);
                    return Ok(chain);
                }
                WalkState::Failed { at, kind } => {
                    chain.status = if kind == WalkErrorKind::Cancelled {
                        ChainStatus::Cancelled
                    } else {
                        ChainStatus::Failed
                    };
                    warn!(
                        origin = %chain.origin,
                        steps = chain.len(),
                        failed_at = %at,
                        error = %kind,
                        "Lineage walk stopped early"
                    );
                    return Err(Box::new(WalkError {
                        chain,
                        failed_at: at,
                        kind,
                    }));
                }
            };
        }
    }

    /// `Querying`: fetch and decode one hop. On failure, returns the most
    /// precise target known (with the resolved version once it is known).
    async fn query(&self, target: &WalkTarget) -> Result<LineageStep, (WalkTarget, WalkErrorKind)> {
        let started = Instant::now();
        let asset = target.asset();

        let version = match target.version() {
            Some(version) => version,
            None => self
                .guarded(self.client.fetch_latest_version(asset))
                .await
                .map_err(|kind| (target.clone(), kind))?,
        };
        let resolved = WalkTarget::at(asset, version);

        let tx = self
            .guarded(self.client.fetch_by_version(version))
            .await
            .map_err(|kind| (resolved.clone(), kind))?;

        let (provenance, resolution) =
            decode_step(&tx, asset, &self.config).map_err(|kind| (resolved.clone(), kind))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            asset,
            version = %version,
            func = %provenance.func_name,
            edges = resolution.edges.len(),
            gaps = resolution.gaps.len(),
            elapsed_ms,
            "Lineage step decoded"
        );

        Ok(LineageStep {
            asset: asset.to_string(),
            version,
            provenance,
            edges: resolution.edges,
            gaps: resolution.gaps,
            followed: None,
            elapsed_ms,
        })
    }

    /// `Decoded`: record the step and pick the next state.
    fn decide(
        &self,
        chain: &mut LineageChain,
        mut step: LineageStep,
        policy: &dyn SelectionPolicy,
        max_depth: usize,
    ) -> WalkState {
        let selection = policy.select(chain.len(), &step.asset, &step.edges);
        let no_edges = step.edges.is_empty();

        let next = match &selection {
            Selection::Stop if no_edges => WalkState::Terminal(TerminalReason::NoDependencies),
            Selection::Stop => WalkState::Terminal(TerminalReason::PolicyStopped),
            Selection::Follow(target) | Selection::Require(target) => {
                match first_edge_for(&step.edges, target) {
                    Some(edge) if chain.len() + 1 >= max_depth => {
                        debug!(asset = %step.asset, next = %edge, max_depth, "Depth limit reached");
                        WalkState::Terminal(TerminalReason::MaxDepthReached { max_depth })
                    }
                    Some(edge) => WalkState::Advancing(edge.clone()),
                    None if matches!(selection, Selection::Require(_)) => WalkState::Failed {
                        at: WalkTarget::at(step.asset.clone(), step.version),
                        kind: WalkErrorKind::UnresolvedDependency {
                            asset: step.asset.clone(),
                            dependency: target.clone(),
                        },
                    },
                    None if no_edges => WalkState::Terminal(TerminalReason::NoDependencies),
                    None => WalkState::Terminal(TerminalReason::NoMatchingEdge {
                        target: target.clone(),
                    }),
                }
            }
        };

        if let WalkState::Advancing(edge) = &next {
            step.followed = Some(edge.clone());
        }
        chain.steps.push(step);
        next
    }

    /// Await a ledger call unless the walk is cancelled first.
    async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, WalkErrorKind> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(WalkErrorKind::Cancelled),
            result = call => result.map_err(WalkErrorKind::from),
        }
    }
}
