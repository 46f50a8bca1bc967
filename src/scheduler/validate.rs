//! Skeleton validation.
//!
//! The dating pass in [`super::generate`] assumes parent-first WBS entries
//! and dependency-ordered activities, and silently degrades when the input
//! breaks that contract. This pass makes the contract checkable: it reports
//! every reference the sweep would fail to resolve, plus cycles that no
//! ordering could fix. An empty report means the sweep resolves everything.

use std::collections::HashMap;

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};

use super::Skeleton;

/// A problem the dating pass would silently degrade on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonIssue {
    /// Two WBS entries share a code; later references are ambiguous.
    DuplicateWbsCode { code: String },
    /// Two activities share a code; later references are ambiguous.
    DuplicateActivityCode { code: String },
    /// A WBS entry names a parent that does not exist.
    WbsParentMissing { code: String, parent: String },
    /// A WBS entry names a parent that is listed after it; the sweep
    /// attaches the child to the root.
    WbsParentListedLater { code: String, parent: String },
    /// WBS parent references form a cycle.
    WbsCycle { codes: Vec<String> },
    /// An activity names a predecessor that does not exist.
    PredecessorMissing { code: String, predecessor: String },
    /// An activity names a predecessor that is listed after it; the sweep
    /// ignores it when computing dates.
    PredecessorListedLater { code: String, predecessor: String },
    /// Predecessor references form a cycle; no ordering satisfies them.
    DependencyCycle { codes: Vec<String> },
    /// A milestone carries a nonzero duration; the sweep clamps it to 0.
    MilestoneWithDuration { code: String },
}

impl std::fmt::Display for SkeletonIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkeletonIssue::DuplicateWbsCode { code } => {
                write!(f, "duplicate wbs code {}", code)
            }
            SkeletonIssue::DuplicateActivityCode { code } => {
                write!(f, "duplicate activity code {}", code)
            }
            SkeletonIssue::WbsParentMissing { code, parent } => {
                write!(f, "wbs {} references missing parent {}", code, parent)
            }
            SkeletonIssue::WbsParentListedLater { code, parent } => {
                write!(f, "wbs {} is listed before its parent {}", code, parent)
            }
            SkeletonIssue::WbsCycle { codes } => {
                write!(f, "wbs parent cycle: {}", codes.join(" -> "))
            }
            SkeletonIssue::PredecessorMissing { code, predecessor } => {
                write!(
                    f,
                    "activity {} references missing predecessor {}",
                    code, predecessor
                )
            }
            SkeletonIssue::PredecessorListedLater { code, predecessor } => {
                write!(
                    f,
                    "activity {} is listed before its predecessor {}",
                    code, predecessor
                )
            }
            SkeletonIssue::DependencyCycle { codes } => {
                write!(f, "dependency cycle: {}", codes.join(" -> "))
            }
            SkeletonIssue::MilestoneWithDuration { code } => {
                write!(f, "milestone {} has a nonzero duration", code)
            }
        }
    }
}

/// Check a skeleton against the ordering contract of the dating pass.
pub fn validate(skeleton: &Skeleton) -> Vec<SkeletonIssue> {
    let mut issues = Vec::new();

    // Positions by code; first occurrence wins, duplicates reported.
    let mut wbs_position: HashMap<&str, usize> = HashMap::new();
    for (index, entry) in skeleton.wbs.iter().enumerate() {
        if wbs_position.insert(entry.code.as_str(), index).is_some() {
            issues.push(SkeletonIssue::DuplicateWbsCode {
                code: entry.code.clone(),
            });
        }
    }
    let mut activity_position: HashMap<&str, usize> = HashMap::new();
    for (index, entry) in skeleton.activities.iter().enumerate() {
        if activity_position
            .insert(entry.code.as_str(), index)
            .is_some()
        {
            issues.push(SkeletonIssue::DuplicateActivityCode {
                code: entry.code.clone(),
            });
        }
    }

    // WBS parent references.
    for (index, entry) in skeleton.wbs.iter().enumerate() {
        if let Some(parent) = &entry.parent_code {
            match wbs_position.get(parent.as_str()) {
                None => issues.push(SkeletonIssue::WbsParentMissing {
                    code: entry.code.clone(),
                    parent: parent.clone(),
                }),
                Some(&pos) if pos >= index => {
                    issues.push(SkeletonIssue::WbsParentListedLater {
                        code: entry.code.clone(),
                        parent: parent.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }
    issues.extend(
        cycles(
            skeleton.wbs.iter().map(|e| e.code.as_str()),
            skeleton.wbs.iter().filter_map(|e| {
                e.parent_code
                    .as_deref()
                    .map(|parent| (parent, e.code.as_str()))
            }),
        )
        .into_iter()
        .map(|codes| SkeletonIssue::WbsCycle { codes }),
    );

    // Predecessor references.
    for (index, entry) in skeleton.activities.iter().enumerate() {
        if entry.kind == crate::model::ActivityKind::Milestone && entry.duration_days != 0 {
            issues.push(SkeletonIssue::MilestoneWithDuration {
                code: entry.code.clone(),
            });
        }
        for predecessor in &entry.predecessors {
            match activity_position.get(predecessor.as_str()) {
                None => issues.push(SkeletonIssue::PredecessorMissing {
                    code: entry.code.clone(),
                    predecessor: predecessor.clone(),
                }),
                Some(&pos) if pos >= index => {
                    issues.push(SkeletonIssue::PredecessorListedLater {
                        code: entry.code.clone(),
                        predecessor: predecessor.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }
    issues.extend(
        cycles(
            skeleton.activities.iter().map(|e| e.code.as_str()),
            skeleton.activities.iter().flat_map(|e| {
                e.predecessors
                    .iter()
                    .map(move |p| (p.as_str(), e.code.as_str()))
            }),
        )
        .into_iter()
        .map(|codes| SkeletonIssue::DependencyCycle { codes }),
    );

    issues
}

/// Strongly connected components of size > 1 (or with a self-edge) in the
/// reference graph, as code lists.
fn cycles<'a>(
    codes: impl Iterator<Item = &'a str>,
    edges: impl Iterator<Item = (&'a str, &'a str)>,
) -> Vec<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for code in codes {
        nodes.entry(code).or_insert_with(|| graph.add_node(code));
    }
    for (from, to) in edges {
        if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
            graph.add_edge(a, b, ());
        }
    }

    if !is_cyclic_directed(&graph) {
        return Vec::new();
    }
    tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1 || scc.iter().any(|&n| graph.contains_edge(n, n))
        })
        .map(|scc| scc.into_iter().map(|n| graph[n].to_string()).collect())
        .collect()
}
