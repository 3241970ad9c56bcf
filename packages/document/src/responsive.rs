//! # Responsive Override Resolution
//!
//! Effective properties cascade from wide to narrow: a breakpoint inherits
//! every wider value it does not override itself.
//!
//! ```text
//! desktop = base
//! tablet  = base ← overrides.tablet
//! mobile  = base ← overrides.tablet ← overrides.mobile
//! ```
//!
//! Absent buckets behave as empty patches.

use serde_json::Value;

use crate::node::{Breakpoint, Node, Props};

/// Effective properties of `node` at `breakpoint`
pub fn effective_props(node: &Node, breakpoint: Breakpoint) -> Props {
    let mut props = node.base_props.clone();
    for bucket in breakpoint.cascade() {
        if let Some(patch) = node.overrides.get(*bucket) {
            props.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    props
}

/// Effective value of a single key, without building the full map
pub fn effective_value<'a>(node: &'a Node, breakpoint: Breakpoint, key: &str) -> Option<&'a Value> {
    breakpoint
        .cascade()
        .iter()
        .rev()
        .find_map(|bucket| node.overrides.get(*bucket).and_then(|patch| patch.get(key)))
        .or_else(|| node.base_props.get(key))
}

/// Breakpoint whose layer supplies the effective value of `key`.
///
/// Property panels use this to mark a value as inherited.
pub fn value_source(node: &Node, breakpoint: Breakpoint, key: &str) -> Option<Breakpoint> {
    breakpoint
        .cascade()
        .iter()
        .rev()
        .copied()
        .find(|bucket| {
            node.overrides
                .get(*bucket)
                .map(|patch| patch.contains_key(key))
                .unwrap_or(false)
        })
        .or_else(|| node.base_props.contains_key(key).then_some(Breakpoint::Desktop))
}
