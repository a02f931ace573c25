//! Folding per-node results into report checks
//!
//! Everything here is a pure function of the completed node map, so the
//! checks do not depend on the order in which nodes finished.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::check::{CheckStatus, Status, complex_check};
use crate::copc::{Node, VoxelKey};
use crate::scanner::rules::{PointRule, RuleStatuses};
use crate::suite::Suite;

/// Most node keys listed in one diagnostic
pub const MAX_LISTED_KEYS: usize = 50;

/// A node and the status of every point rule over it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedNode {
    pub node: Node,
    pub rules: RuleStatuses,
    pub points_read: u64,
}

impl CheckedNode {
    /// Placeholder for nodes with no points; nothing is read for them
    pub fn empty(node: Node) -> Self {
        Self {
            node,
            rules: RuleStatuses::all(CheckStatus::Pass),
            points_read: 0,
        }
    }
}

pub type AllNodesChecked = BTreeMap<VoxelKey, CheckedNode>;

/// Everything the point data rules look at once a scan has completed
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Every node of the hierarchy
    pub hierarchy: BTreeMap<VoxelKey, Node>,
    /// The nodes that were scanned
    pub checked: AllNodesChecked,
    /// Point count declared by the header
    pub header_point_count: u64,
}

pub fn point_data_suite() -> Suite<ScanOutcome> {
    let mut suite = Suite::<ScanOutcome>::new();
    for rule in PointRule::ALL {
        suite = suite.check(rule.id(), move |outcome: &ScanOutcome| {
            rule_status(rule, &outcome.checked)
        });
    }
    suite
        .check("zeroPoints", |outcome| zero_points(&outcome.checked))
        .check("nodesReachable", |outcome| {
            nodes_reachable(&outcome.hierarchy, &outcome.checked)
        })
        .check("hierarchyPointCount", |outcome| {
            let total: u64 = outcome.hierarchy.values().map(|n| n.point_count).sum();
            complex_check(total, |t| *t == outcome.header_point_count)
                .on_failure(format!(
                    "Hierarchy holds {} points, header declares {}",
                    total, outcome.header_point_count
                ))
                .status()
        })
}

/// `pass` when every node passed, `warn` when none failed but some warned,
/// `fail` otherwise; the info lists the nodes behind the worst status
pub fn rule_status(rule: PointRule, checked: &AllNodesChecked) -> Status {
    let worst = checked
        .values()
        .map(|c| c.rules.get(rule))
        .max()
        .unwrap_or(CheckStatus::Pass);
    if worst == CheckStatus::Pass {
        return Status::pass();
    }

    let offending = checked
        .iter()
        .filter(|(_, c)| c.rules.get(rule) == worst)
        .map(|(key, _)| key);
    Status {
        status: worst,
        info: Some(list_keys(rule.message(), offending)),
    }
}

pub fn zero_points(checked: &AllNodesChecked) -> Status {
    let empty: Vec<&VoxelKey> = checked
        .iter()
        .filter(|(_, c)| c.node.point_count == 0)
        .map(|(key, _)| key)
        .collect();
    if empty.is_empty() {
        Status::pass()
    } else {
        Status::warn(list_keys("Nodes with zero points", empty))
    }
}

/// Every node in the hierarchy must have been scanned
pub fn nodes_reachable(hierarchy: &BTreeMap<VoxelKey, Node>, checked: &AllNodesChecked) -> Status {
    let missing: Vec<&VoxelKey> = hierarchy
        .keys()
        .filter(|key| !checked.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Status::pass()
    } else {
        Status::fail(list_keys("Unreachable nodes", missing))
    }
}

/// `"<message>: [ k1, k2 ]"`, with at most [`MAX_LISTED_KEYS`] keys and a
/// count of the rest
pub fn list_keys<'a>(message: &str, keys: impl IntoIterator<Item = &'a VoxelKey>) -> String {
    let mut listed = Vec::new();
    let mut rest = 0usize;
    for key in keys {
        if listed.len() < MAX_LISTED_KEYS {
            listed.push(key.to_string());
        } else {
            rest += 1;
        }
    }

    let mut info = format!("{}: [ {} ]", message, listed.join(", "));
    if rest > 0 {
        info.push_str(&format!(" ... ({} more)", rest));
    }
    info
}
