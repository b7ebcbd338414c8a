//! Selection policies: which dependency a walk follows next.
//!
//! A policy sees the step index, the asset under investigation and the
//! dependency edges resolved for it, and answers with a [`Selection`]. The
//! walker owns all traversal mechanics; policies only carry domain knowledge
//! and hold no per-walk state, so one instance can drive any number of walks.

use crate::types::DependencyEdge;

/// A policy's decision for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// End the walk here.
    Stop,
    /// Follow this dependency if an edge exists; otherwise end the walk.
    Follow(String),
    /// Follow this dependency; a missing edge fails the walk.
    Require(String),
}

impl Selection {
    pub fn target(&self) -> Option<&str> {
        match self {
            Selection::Stop => None,
            Selection::Follow(t) | Selection::Require(t) => Some(t),
        }
    }
}

/// Chooses the next dependency to follow.
///
/// `depth` is the zero-based index of the step being decided within its walk.
pub trait SelectionPolicy: Send + Sync {
    fn select(&self, depth: usize, asset: &str, edges: &[DependencyEdge]) -> Selection;
}

impl<F> SelectionPolicy for F
where
    F: Fn(usize, &str, &[DependencyEdge]) -> Selection + Send + Sync,
{
    fn select(&self, depth: usize, asset: &str, edges: &[DependencyEdge]) -> Selection {
        self(depth, asset, edges)
    }
}

/// Always follow one named dependency.
#[derive(Debug, Clone)]
pub struct FollowKey {
    key: String,
}

impl FollowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl SelectionPolicy for FollowKey {
    fn select(&self, _depth: usize, _asset: &str, _edges: &[DependencyEdge]) -> Selection {
        Selection::Follow(self.key.clone())
    }
}

/// Follow the asset's own previous version, walking its history.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowSelf;

impl SelectionPolicy for FollowSelf {
    fn select(&self, _depth: usize, asset: &str, _edges: &[DependencyEdge]) -> Selection {
        Selection::Follow(asset.to_string())
    }
}

/// Inspect a single step and stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopPolicy;

impl SelectionPolicy for StopPolicy {
    fn select(&self, _depth: usize, _asset: &str, _edges: &[DependencyEdge]) -> Selection {
        Selection::Stop
    }
}

/// Follow a scripted sequence of dependencies, one per hop.
///
/// Step `n` follows `path[n]`; once the path is exhausted the walk stops.
#[derive(Debug, Clone, Default)]
pub struct FollowPath {
    path: Vec<String>,
    strict: bool,
}

impl FollowPath {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            strict: false,
        }
    }

    /// Fail the walk when a scripted hop has no resolved edge.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Number of scripted hops.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl SelectionPolicy for FollowPath {
    fn select(&self, depth: usize, _asset: &str, _edges: &[DependencyEdge]) -> Selection {
        match self.path.get(depth) {
            None => Selection::Stop,
            Some(next) if self.strict => Selection::Require(next.clone()),
            Some(next) => Selection::Follow(next.clone()),
        }
    }
}
