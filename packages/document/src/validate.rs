//! # Invariant Checking and Repair
//!
//! Persisted documents are flat maps of [`NodeRecord`]s, so nothing about
//! their shape can be trusted on load. [`check`] lists every broken tree
//! invariant; [`repair`] rewrites the records into a valid tree and reports
//! each change it made.
//!
//! ## Repair Order
//!
//! ```text
//! 1. drop override buckets other than tablet / mobile
//! 2. clean child lists   (dangling, duplicate, claimed by the real parent)
//! 3. empty non-canvas child lists
//! 4. walk from the root  (first claim wins, parentId follows the claim)
//! 5. clear the root's parentId
//! 6. adopt everything unreached at the end of the root's children, by id
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::error::CorruptDocument;
use crate::node::NodeId;
use crate::serializer::NodeRecord;

/// Override buckets a record may carry
pub const OVERRIDE_BUCKETS: [&str; 2] = ["tablet", "mobile"];

/// A broken tree invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    MissingRoot { node_id: NodeId },
    RootHasParent { node_id: NodeId, parent_id: NodeId },
    MissingParent { node_id: NodeId },
    DanglingChild { parent_id: NodeId, child_id: NodeId },
    DanglingParent { node_id: NodeId, parent_id: NodeId },
    ParentMismatch { parent_id: NodeId, child_id: NodeId },
    NotListed { node_id: NodeId, parent_id: NodeId },
    DuplicateChild { parent_id: NodeId, child_id: NodeId },
    Cycle { node_ids: Vec<NodeId> },
    Unreachable { node_id: NodeId },
    LeafWithChildren { node_id: NodeId },
    InvalidOverrideBucket { node_id: NodeId, bucket: String },
}

impl Violation {
    /// Node ids this violation refers to
    pub fn node_ids(&self) -> Vec<&str> {
        match self {
            Violation::MissingRoot { node_id }
            | Violation::MissingParent { node_id }
            | Violation::Unreachable { node_id }
            | Violation::LeafWithChildren { node_id }
            | Violation::InvalidOverrideBucket { node_id, .. } => vec![node_id],
            Violation::RootHasParent { node_id, parent_id }
            | Violation::DanglingParent { node_id, parent_id }
            | Violation::NotListed { node_id, parent_id } => vec![node_id, parent_id],
            Violation::DanglingChild { parent_id, child_id }
            | Violation::ParentMismatch { parent_id, child_id }
            | Violation::DuplicateChild { parent_id, child_id } => vec![parent_id, child_id],
            Violation::Cycle { node_ids } => node_ids.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingRoot { node_id } => {
                write!(f, "root {node_id} is not in the node map")
            }
            Violation::RootHasParent { node_id, parent_id } => {
                write!(f, "root {node_id} has parent {parent_id}")
            }
            Violation::MissingParent { node_id } => {
                write!(f, "{node_id} has no parent but is not the root")
            }
            Violation::DanglingChild { parent_id, child_id } => {
                write!(f, "{parent_id} lists missing child {child_id}")
            }
            Violation::DanglingParent { node_id, parent_id } => {
                write!(f, "{node_id} names missing parent {parent_id}")
            }
            Violation::ParentMismatch { parent_id, child_id } => {
                write!(f, "{parent_id} lists {child_id}, which names a different parent")
            }
            Violation::NotListed { node_id, parent_id } => {
                write!(f, "{node_id} names parent {parent_id}, which does not list it")
            }
            Violation::DuplicateChild { parent_id, child_id } => {
                write!(f, "{parent_id} lists {child_id} more than once")
            }
            Violation::Cycle { node_ids } => write!(f, "cycle through [{}]", node_ids.join(", ")),
            Violation::Unreachable { node_id } => {
                write!(f, "{node_id} is not reachable from the root")
            }
            Violation::LeafWithChildren { node_id } => {
                write!(f, "{node_id} is not a canvas but has children")
            }
            Violation::InvalidOverrideBucket { node_id, bucket } => {
                write!(f, "{node_id} has an override bucket for '{bucket}'")
            }
        }
    }
}

/// A structural change made by [`repair`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Repair {
    ClearedRootParent { node_id: NodeId, parent_id: NodeId },
    DroppedOverrideBucket { node_id: NodeId, bucket: String },
    DroppedDanglingChild { parent_id: NodeId, child_id: NodeId },
    DroppedDuplicateChild { parent_id: NodeId, child_id: NodeId },
    DroppedForeignChild { parent_id: NodeId, child_id: NodeId },
    DetachedFromLeaf { parent_id: NodeId, child_id: NodeId },
    Reparented { node_id: NodeId, from: Option<NodeId>, to: NodeId },
    ReattachedOrphan { node_id: NodeId, root_id: NodeId },
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::ClearedRootParent { node_id, parent_id } => {
                write!(f, "cleared parent {parent_id} of root {node_id}")
            }
            Repair::DroppedOverrideBucket { node_id, bucket } => {
                write!(f, "dropped '{bucket}' overrides from {node_id}")
            }
            Repair::DroppedDanglingChild { parent_id, child_id } => {
                write!(f, "removed missing child {child_id} from {parent_id}")
            }
            Repair::DroppedDuplicateChild { parent_id, child_id } => {
                write!(f, "removed duplicate child {child_id} from {parent_id}")
            }
            Repair::DroppedForeignChild { parent_id, child_id } => {
                write!(f, "removed {child_id} from {parent_id}; it belongs elsewhere")
            }
            Repair::DetachedFromLeaf { parent_id, child_id } => {
                write!(f, "detached {child_id} from non-canvas {parent_id}")
            }
            Repair::Reparented { node_id, from, to } => match from {
                Some(from) => write!(f, "moved {node_id} from {from} to {to}"),
                None => write!(f, "set parent of {node_id} to {to}"),
            },
            Repair::ReattachedOrphan { node_id, root_id } => {
                write!(f, "reattached orphan {node_id} under {root_id}")
            }
        }
    }
}

/// Every invariant violation in `records`, empty when the tree is valid
pub fn check(root_id: &str, records: &BTreeMap<NodeId, NodeRecord>) -> Vec<Violation> {
    let mut violations = Vec::new();

    let root = records.get(root_id);
    match root {
        None => violations.push(Violation::MissingRoot {
            node_id: root_id.to_string(),
        }),
        Some(root) => {
            if let Some(parent_id) = &root.parent_id {
                violations.push(Violation::RootHasParent {
                    node_id: root_id.to_string(),
                    parent_id: parent_id.clone(),
                });
            }
        }
    }

    for (id, record) in records {
        for bucket in record.overrides.keys() {
            if !OVERRIDE_BUCKETS.contains(&bucket.as_str()) {
                violations.push(Violation::InvalidOverrideBucket {
                    node_id: id.clone(),
                    bucket: bucket.clone(),
                });
            }
        }

        if !record.canvas && !record.child_ids.is_empty() {
            violations.push(Violation::LeafWithChildren { node_id: id.clone() });
        }

        let mut seen = BTreeSet::new();
        for child_id in &record.child_ids {
            if !seen.insert(child_id.as_str()) {
                violations.push(Violation::DuplicateChild {
                    parent_id: id.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            }
            match records.get(child_id) {
                None => violations.push(Violation::DanglingChild {
                    parent_id: id.clone(),
                    child_id: child_id.clone(),
                }),
                Some(child) if child.parent_id.as_deref() != Some(id.as_str()) => {
                    violations.push(Violation::ParentMismatch {
                        parent_id: id.clone(),
                        child_id: child_id.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        if id == root_id {
            continue;
        }
        match &record.parent_id {
            None => violations.push(Violation::MissingParent { node_id: id.clone() }),
            Some(parent_id) => match records.get(parent_id) {
                None => violations.push(Violation::DanglingParent {
                    node_id: id.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(parent) if !parent.child_ids.contains(id) => {
                    violations.push(Violation::NotListed {
                        node_id: id.clone(),
                        parent_id: parent_id.clone(),
                    })
                }
                Some(_) => {}
            },
        }
    }

    violations.extend(
        find_cycles(records)
            .into_iter()
            .map(|node_ids| Violation::Cycle { node_ids }),
    );

    if root.is_some() {
        let reached = reachable(root_id, records);
        violations.extend(
            records
                .keys()
                .filter(|id| !reached.contains(id.as_str()))
                .map(|id| Violation::Unreachable { node_id: id.clone() }),
        );
    }

    violations
}

/// Cycles in the parent chain, each as its sorted member ids
fn find_cycles(records: &BTreeMap<NodeId, NodeRecord>) -> Vec<Vec<NodeId>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        OnPath,
        Done,
    }

    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut cycles = Vec::new();

    for start in records.keys() {
        let mut path: Vec<&str> = Vec::new();
        let mut current = Some(start.as_str());

        while let Some(id) = current {
            match marks.get(id) {
                Some(Mark::Done) => break,
                Some(Mark::OnPath) => {
                    if let Some(pos) = path.iter().position(|p| *p == id) {
                        let mut members: Vec<NodeId> =
                            path[pos..].iter().map(|s| s.to_string()).collect();
                        members.sort();
                        cycles.push(members);
                    }
                    break;
                }
                None => {}
            }
            marks.insert(id, Mark::OnPath);
            path.push(id);
            current = records
                .get(id)
                .and_then(|r| r.parent_id.as_deref())
                .filter(|p| records.contains_key(*p));
        }

        for id in path {
            marks.insert(id, Mark::Done);
        }
    }

    cycles
}

/// Ids reachable from the root through child lists
fn reachable<'a>(root_id: &'a str, records: &'a BTreeMap<NodeId, NodeRecord>) -> BTreeSet<&'a str> {
    let mut reached = BTreeSet::new();
    let mut queue = VecDeque::from([root_id]);

    while let Some(id) = queue.pop_front() {
        if !reached.insert(id) {
            continue;
        }
        if let Some(record) = records.get(id) {
            queue.extend(
                record
                    .child_ids
                    .iter()
                    .map(String::as_str)
                    .filter(|c| records.contains_key(*c)),
            );
        }
    }

    reached
}

/// Rewrite `records` into a valid tree rooted at `root_id`.
///
/// Fails when the root is missing, or when orphans need a home and the root
/// is not a canvas.
pub fn repair(
    root_id: &str,
    mut records: BTreeMap<NodeId, NodeRecord>,
) -> Result<(BTreeMap<NodeId, NodeRecord>, Vec<Repair>), CorruptDocument> {
    let violations = check(root_id, &records);
    if violations.is_empty() {
        return Ok((records, Vec::new()));
    }
    if !records.contains_key(root_id) {
        return Err(CorruptDocument {
            violations,
            reason: Some(format!("root {root_id} is missing")),
        });
    }

    let mut repairs = Vec::new();
    drop_invalid_buckets(&mut records, &mut repairs);
    clean_child_lists(&mut records, &mut repairs);

    if let Some(root) = records.get_mut(root_id) {
        if let Some(parent_id) = root.parent_id.take() {
            repairs.push(Repair::ClearedRootParent {
                node_id: root_id.to_string(),
                parent_id,
            });
        }
    }

    let mut claimed = BTreeSet::from([root_id.to_string()]);
    claim_from(root_id, &mut records, &mut claimed, &mut repairs);

    loop {
        let unclaimed: Vec<NodeId> = records
            .keys()
            .filter(|id| !claimed.contains(*id))
            .cloned()
            .collect();
        if unclaimed.is_empty() {
            break;
        }

        let root_is_canvas = records.get(root_id).map(|r| r.canvas).unwrap_or(false);
        if !root_is_canvas {
            return Err(CorruptDocument {
                violations,
                reason: Some(format!(
                    "root {root_id} cannot contain children but {} node(s) need a parent",
                    unclaimed.len()
                )),
            });
        }

        // A top is an unclaimed node whose parent will never claim it.
        let mut tops: Vec<NodeId> = unclaimed
            .iter()
            .filter(|id| {
                match records.get(*id).and_then(|r| r.parent_id.as_ref()) {
                    None => true,
                    Some(parent_id) => {
                        !records.contains_key(parent_id) || claimed.contains(parent_id)
                    }
                }
            })
            .cloned()
            .collect();
        if tops.is_empty() {
            // Only cycles remain; break the smallest one open.
            tops.extend(unclaimed.first().cloned());
        }

        for top in tops {
            if claimed.contains(&top) {
                continue;
            }
            if let Some(record) = records.get_mut(&top) {
                record.parent_id = Some(root_id.to_string());
            }
            if let Some(root) = records.get_mut(root_id) {
                root.child_ids.push(top.clone());
            }
            repairs.push(Repair::ReattachedOrphan {
                node_id: top.clone(),
                root_id: root_id.to_string(),
            });
            claimed.insert(top.clone());
            claim_from(&top, &mut records, &mut claimed, &mut repairs);
        }
    }

    for repair in &repairs {
        tracing::warn!(%repair, "document repair");
    }

    let remaining = check(root_id, &records);
    if !remaining.is_empty() {
        return Err(CorruptDocument {
            violations: remaining,
            reason: Some("repair left violations behind".to_string()),
        });
    }

    Ok((records, repairs))
}

fn drop_invalid_buckets(records: &mut BTreeMap<NodeId, NodeRecord>, repairs: &mut Vec<Repair>) {
    for (id, record) in records.iter_mut() {
        let invalid: Vec<String> = record
            .overrides
            .keys()
            .filter(|b| !OVERRIDE_BUCKETS.contains(&b.as_str()))
            .cloned()
            .collect();
        for bucket in invalid {
            record.overrides.remove(&bucket);
            repairs.push(Repair::DroppedOverrideBucket {
                node_id: id.clone(),
                bucket,
            });
        }
    }
}

fn clean_child_lists(records: &mut BTreeMap<NodeId, NodeRecord>, repairs: &mut Vec<Repair>) {
    let mut cleaned: Vec<(NodeId, Vec<NodeId>)> = Vec::new();

    for (id, record) in records.iter() {
        let mut kept = Vec::with_capacity(record.child_ids.len());
        for child_id in &record.child_ids {
            let Some(child) = records.get(child_id) else {
                repairs.push(Repair::DroppedDanglingChild {
                    parent_id: id.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            };
            if kept.contains(child_id) {
                repairs.push(Repair::DroppedDuplicateChild {
                    parent_id: id.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            }
            let claimed_by_own_parent = child
                .parent_id
                .as_ref()
                .filter(|p| *p != id)
                .and_then(|p| records.get(p))
                .map(|p| p.child_ids.contains(child_id))
                .unwrap_or(false);
            if claimed_by_own_parent {
                repairs.push(Repair::DroppedForeignChild {
                    parent_id: id.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            }
            if !record.canvas {
                repairs.push(Repair::DetachedFromLeaf {
                    parent_id: id.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            }
            kept.push(child_id.clone());
        }
        if kept != record.child_ids {
            cleaned.push((id.clone(), kept));
        }
    }

    for (id, kept) in cleaned {
        if let Some(record) = records.get_mut(&id) {
            record.child_ids = kept;
        }
    }
}

/// Breadth-first claim of everything below `start`
fn claim_from(
    start: &str,
    records: &mut BTreeMap<NodeId, NodeRecord>,
    claimed: &mut BTreeSet<NodeId>,
    repairs: &mut Vec<Repair>,
) {
    let mut queue = VecDeque::from([start.to_string()]);

    while let Some(parent_id) = queue.pop_front() {
        let children = records
            .get(&parent_id)
            .map(|r| r.child_ids.clone())
            .unwrap_or_default();

        let mut kept = Vec::with_capacity(children.len());
        for child_id in children {
            if !claimed.insert(child_id.clone()) {
                repairs.push(Repair::DroppedForeignChild {
                    parent_id: parent_id.clone(),
                    child_id,
                });
                continue;
            }
            if let Some(child) = records.get_mut(&child_id) {
                if child.parent_id.as_deref() != Some(parent_id.as_str()) {
                    repairs.push(Repair::Reparented {
                        node_id: child_id.clone(),
                        from: child.parent_id.replace(parent_id.clone()),
                        to: parent_id.clone(),
                    });
                }
            }
            queue.push_back(child_id.clone());
            kept.push(child_id);
        }

        if let Some(record) = records.get_mut(&parent_id) {
            record.child_ids = kept;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Props;

    fn record(
        component: &str,
        parent: Option<&str>,
        children: &[&str],
        canvas: bool,
    ) -> NodeRecord {
        NodeRecord {
            component: component.to_string(),
            parent_id: parent.map(str::to_string),
            child_ids: children.iter().map(|c| c.to_string()).collect(),
            canvas,
            locked: false,
            hidden: false,
            base_props: Props::new(),
            overrides: BTreeMap::new(),
        }
    }

    fn valid() -> BTreeMap<NodeId, NodeRecord> {
        BTreeMap::from([
            ("root".to_string(), record("Container", None, &["a", "b"], true)),
            ("a".to_string(), record("Container", Some("root"), &["c"], true)),
            ("b".to_string(), record("Text", Some("root"), &[], false)),
            ("c".to_string(), record("Button", Some("a"), &[], false)),
        ])
    }

    #[test]
    fn test_valid_tree_has_no_violations() {
        assert!(check("root", &valid()).is_empty());
    }

    #[test]
    fn test_missing_root() {
        let violations = check("ghost", &valid());
        assert!(violations.contains(&Violation::MissingRoot { node_id: "ghost".into() }));

        let err = repair("ghost", valid()).unwrap_err();
        assert!(err.reason.is_some());
        assert!(err.node_ids().contains(&"ghost".to_string()));
    }

    #[test]
    fn test_dangling_child_is_reported_and_pruned() {
        let mut records = valid();
        records.get_mut("a").unwrap().child_ids.push("ghost".into());

        let violations = check("root", &records);
        assert_eq!(
            violations,
            vec![Violation::DanglingChild {
                parent_id: "a".into(),
                child_id: "ghost".into()
            }]
        );

        let (fixed, repairs) = repair("root", records).unwrap();
        assert_eq!(fixed["a"].child_ids, vec!["c".to_string()]);
        assert_eq!(
            repairs,
            vec![Repair::DroppedDanglingChild {
                parent_id: "a".into(),
                child_id: "ghost".into()
            }]
        );
    }

    #[test]
    fn test_leaf_with_children() {
        let mut records = valid();
        records.get_mut("b").unwrap().child_ids.push("c".into());
        records.get_mut("a").unwrap().child_ids.clear();
        records.get_mut("c").unwrap().parent_id = Some("b".into());

        let leaf = Violation::LeafWithChildren { node_id: "b".into() };
        assert!(check("root", &records).contains(&leaf));

        let (fixed, repairs) = repair("root", records).unwrap();
        assert!(fixed["b"].child_ids.is_empty());
        assert_eq!(fixed["c"].parent_id.as_deref(), Some("root"));
        assert!(repairs.contains(&Repair::DetachedFromLeaf {
            parent_id: "b".into(),
            child_id: "c".into()
        }));
        assert!(repairs.contains(&Repair::ReattachedOrphan {
            node_id: "c".into(),
            root_id: "root".into()
        }));
    }

    #[test]
    fn test_cycle_is_detected_and_broken() {
        let mut records = valid();
        records.insert("x".into(), record("Container", Some("y"), &["y"], true));
        records.insert("y".into(), record("Container", Some("x"), &["x"], true));

        let violations = check("root", &records);
        assert!(violations.contains(&Violation::Cycle {
            node_ids: vec!["x".into(), "y".into()]
        }));
        assert!(violations.contains(&Violation::Unreachable { node_id: "x".into() }));

        let (fixed, _) = repair("root", records).unwrap();
        assert_eq!(fixed["root"].child_ids, vec!["a", "b", "x"]);
        assert_eq!(fixed["x"].child_ids, vec!["y".to_string()]);
        assert_eq!(fixed["y"].parent_id.as_deref(), Some("x"));
        assert!(fixed["y"].child_ids.is_empty());
        assert!(check("root", &fixed).is_empty());
    }

    #[test]
    fn test_duplicate_and_foreign_children() {
        let mut records = valid();
        records.get_mut("a").unwrap().child_ids = vec!["c".into(), "c".into()];
        records.get_mut("root").unwrap().child_ids.push("c".into());

        let violations = check("root", &records);
        assert!(violations.contains(&Violation::DuplicateChild {
            parent_id: "a".into(),
            child_id: "c".into()
        }));
        assert!(violations.contains(&Violation::ParentMismatch {
            parent_id: "root".into(),
            child_id: "c".into()
        }));

        let (fixed, repairs) = repair("root", records).unwrap();
        assert_eq!(fixed["root"].child_ids, vec!["a", "b"]);
        assert_eq!(fixed["a"].child_ids, vec!["c"]);
        assert_eq!(repairs.len(), 2);
    }

    #[test]
    fn test_invalid_override_bucket() {
        let mut records = valid();
        records
            .get_mut("b")
            .unwrap()
            .overrides
            .insert("desktop".into(), Props::new());

        assert_eq!(
            check("root", &records),
            vec![Violation::InvalidOverrideBucket {
                node_id: "b".into(),
                bucket: "desktop".into()
            }]
        );

        let (fixed, _) = repair("root", records).unwrap();
        assert!(fixed["b"].overrides.is_empty());
    }

    #[test]
    fn test_orphan_under_leaf_root_cannot_be_repaired() {
        let records = BTreeMap::from([
            ("root".to_string(), record("Text", None, &[], false)),
            ("lost".to_string(), record("Text", None, &[], false)),
        ]);

        let err = repair("root", records).unwrap_err();
        assert!(err.violations.contains(&Violation::MissingParent { node_id: "lost".into() }));
        assert!(err.reason.unwrap().contains("cannot contain children"));
    }

    #[test]
    fn test_root_parent_is_cleared() {
        let mut records = valid();
        records.get_mut("root").unwrap().parent_id = Some("a".into());

        let (fixed, repairs) = repair("root", records).unwrap();
        assert!(fixed["root"].parent_id.is_none());
        assert_eq!(
            repairs,
            vec![Repair::ClearedRootParent {
                node_id: "root".into(),
                parent_id: "a".into()
            }]
        );
    }
}
