//! # Page Nodes
//!
//! A page is a tree of [`Node`]s. Each node names a registered component,
//! keeps its children in render order, and carries base properties plus
//! per-breakpoint override patches.
//!
//! Nodes are read-only outside this crate's tree operations: a [`NodeTree`]
//! only ever hands out shared references.
//!
//! [`NodeTree`]: crate::NodeTree

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseBreakpointError;

/// Stable node identifier
pub type NodeId = String;

/// Property name → value mapping.
///
/// `BTreeMap` keeps serialized output and render instructions deterministic.
pub type Props = BTreeMap<String, Value>;

/// Responsive breakpoints, widest first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

/// Preview viewport for a breakpoint (CSS lengths)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: &'static str,
    pub height: &'static str,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 3] = [Breakpoint::Desktop, Breakpoint::Tablet, Breakpoint::Mobile];

    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Desktop => "desktop",
            Breakpoint::Tablet => "tablet",
            Breakpoint::Mobile => "mobile",
        }
    }

    /// Override buckets that apply at this breakpoint, widest first.
    ///
    /// Desktop is the base and has no bucket of its own.
    pub fn cascade(self) -> &'static [Breakpoint] {
        match self {
            Breakpoint::Desktop => &[],
            Breakpoint::Tablet => &[Breakpoint::Tablet],
            Breakpoint::Mobile => &[Breakpoint::Tablet, Breakpoint::Mobile],
        }
    }

    pub fn viewport(self) -> Viewport {
        match self {
            Breakpoint::Desktop => Viewport { width: "100%", height: "100%" },
            Breakpoint::Tablet => Viewport { width: "768px", height: "1024px" },
            Breakpoint::Mobile => Viewport { width: "375px", height: "667px" },
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Breakpoint {
    type Err = ParseBreakpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(Breakpoint::Desktop),
            "tablet" => Ok(Breakpoint::Tablet),
            "mobile" => Ok(Breakpoint::Mobile),
            other => Err(ParseBreakpointError(other.to_string())),
        }
    }
}

/// Per-breakpoint property patches.
///
/// There is deliberately no desktop bucket: desktop values live in
/// [`Node::base_props`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tablet: Option<Props>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<Props>,
}

impl Overrides {
    /// Patch for a breakpoint, `None` for desktop or an absent bucket
    pub fn get(&self, breakpoint: Breakpoint) -> Option<&Props> {
        match breakpoint {
            Breakpoint::Desktop => None,
            Breakpoint::Tablet => self.tablet.as_ref(),
            Breakpoint::Mobile => self.mobile.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tablet.is_none() && self.mobile.is_none()
    }
}

/// A single element of the page tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,

    /// Registered component type name
    pub component: String,

    /// `None` only for the root
    pub parent_id: Option<NodeId>,

    /// Children in render order
    pub child_ids: Vec<NodeId>,

    /// Whether the node may contain children
    pub canvas: bool,

    pub base_props: Props,
    pub overrides: Overrides,
    pub locked: bool,
    pub hidden: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId, component: impl Into<String>, canvas: bool) -> Self {
        Self {
            id,
            component: component.into(),
            parent_id: None,
            child_ids: Vec::new(),
            canvas,
            base_props: Props::new(),
            overrides: Overrides::default(),
            locked: false,
            hidden: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }

    /// Property layer edited at a breakpoint, creating an absent bucket
    pub(crate) fn layer_mut(&mut self, breakpoint: Breakpoint) -> &mut Props {
        match breakpoint {
            Breakpoint::Desktop => &mut self.base_props,
            Breakpoint::Tablet => self.overrides.tablet.get_or_insert_with(Props::new),
            Breakpoint::Mobile => self.overrides.mobile.get_or_insert_with(Props::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_is_wide_to_narrow() {
        assert!(Breakpoint::Desktop.cascade().is_empty());
        assert_eq!(Breakpoint::Tablet.cascade(), &[Breakpoint::Tablet]);
        assert_eq!(
            Breakpoint::Mobile.cascade(),
            &[Breakpoint::Tablet, Breakpoint::Mobile]
        );
    }

    #[test]
    fn test_breakpoint_parse_roundtrip() {
        for bp in Breakpoint::ALL {
            assert_eq!(bp.as_str().parse::<Breakpoint>().unwrap(), bp);
        }
        assert!("widescreen".parse::<Breakpoint>().is_err());
    }

    #[test]
    fn test_viewports() {
        assert_eq!(Breakpoint::Mobile.viewport().width, "375px");
        assert_eq!(Breakpoint::Tablet.viewport().height, "1024px");
        assert_eq!(Breakpoint::Desktop.viewport().width, "100%");
    }

    #[test]
    fn test_desktop_edits_base_props() {
        let mut node = Node::new("n1".into(), "Text", false);
        node.layer_mut(Breakpoint::Desktop)
            .insert("text".into(), serde_json::json!("Hi"));
        assert!(node.overrides.is_empty());

        node.layer_mut(Breakpoint::Mobile);
        assert!(node.overrides.tablet.is_none());
        assert_eq!(node.overrides.get(Breakpoint::Mobile), Some(&Props::new()));
    }
}
