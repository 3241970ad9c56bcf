//! Render walk: the ordered instruction list a delivery layer consumes.

use serde::Serialize;

use crate::node::{Breakpoint, NodeId, Props};
use crate::registry::ComponentRegistry;
use crate::responsive::effective_props;
use crate::tree::NodeTree;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderKind {
    Component { component: String },

    /// Inert box for an unregistered type; its children are not rendered
    Placeholder { component: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInstruction {
    pub node_id: NodeId,
    pub depth: usize,
    pub kind: RenderKind,
    pub props: Props,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Render hidden nodes too (editor canvas)
    pub include_hidden: bool,
}

/// Walk the tree pre-order from the root, resolving every node's type and
/// effective props at `breakpoint`
pub fn render(
    tree: &NodeTree,
    registry: &ComponentRegistry,
    breakpoint: Breakpoint,
    options: RenderOptions,
) -> Vec<RenderInstruction> {
    let mut out = Vec::with_capacity(tree.len());
    let mut stack = vec![(tree.root_id(), 0usize)];

    while let Some((id, depth)) = stack.pop() {
        let Some(node) = tree.get(id) else { continue };
        if node.hidden && !options.include_hidden {
            continue;
        }

        let kind = match registry.resolve_type(&node.component) {
            Ok(definition) => RenderKind::Component {
                component: definition.name.clone(),
            },
            Err(_) => RenderKind::Placeholder {
                component: node.component.clone(),
            },
        };
        let descend = matches!(kind, RenderKind::Component { .. });

        out.push(RenderInstruction {
            node_id: node.id.clone(),
            depth,
            kind,
            props: effective_props(node, breakpoint),
        });

        if descend {
            for child in node.child_ids.iter().rev() {
                stack.push((child.as_str(), depth + 1));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{from_json, RepairMode};
    use serde_json::json;

    #[test]
    fn test_preorder_with_depths() {
        let registry = ComponentRegistry::builtin();
        let mut tree = NodeTree::new(&registry, "Container", &Props::new()).unwrap();
        let root = tree.root_id().to_string();
        let section = tree
            .create_node(&registry, "Container", &Props::new(), &root, 0)
            .unwrap()
            .value;
        let text = tree.create_node(&registry, "Text", &Props::new(), &section, 0).unwrap().value;
        let button = tree.create_node(&registry, "Button", &Props::new(), &root, 1).unwrap().value;

        let order: Vec<(String, usize)> =
            render(&tree, &registry, Breakpoint::Desktop, RenderOptions::default())
                .into_iter()
                .map(|i| (i.node_id, i.depth))
                .collect();

        assert_eq!(order, vec![(root, 0), (section, 1), (text, 2), (button, 1)]);
    }

    #[test]
    fn test_hidden_subtrees_are_skipped() {
        let registry = ComponentRegistry::builtin();
        let mut tree = NodeTree::new(&registry, "Container", &Props::new()).unwrap();
        let root = tree.root_id().to_string();
        let section = tree
            .create_node(&registry, "Container", &Props::new(), &root, 0)
            .unwrap()
            .value;
        tree.create_node(&registry, "Text", &Props::new(), &section, 0).unwrap();
        tree.set_hidden(&registry, &section, true).unwrap();

        let visible = render(&tree, &registry, Breakpoint::Desktop, RenderOptions::default());
        assert_eq!(visible.len(), 1);
        let options = RenderOptions { include_hidden: true };
        let all = render(&tree, &registry, Breakpoint::Desktop, options);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_placeholder_and_breakpoint_props() {
        let registry = ComponentRegistry::builtin();
        let json = r#"{
            "version": 1,
            "root": "r",
            "nodes": {
                "r": { "type": "Container", "parentId": null, "childIds": ["x", "t"], "canvas": true },
                "x": { "type": "Carousel", "parentId": "r", "childIds": ["y"], "canvas": true },
                "y": { "type": "Text", "parentId": "x", "childIds": [] },
                "t": {
                    "type": "Text", "parentId": "r", "childIds": [],
                    "baseProps": { "text": "Hi", "color": "black" },
                    "overrides": { "tablet": { "color": "red" } }
                }
            }
        }"#;
        let loaded = from_json(json, &registry, RepairMode::Strict).unwrap();

        let out =
            render(loaded.document.tree(), &registry, Breakpoint::Mobile, RenderOptions::default());
        let ids: Vec<&str> = out.iter().map(|i| i.node_id.as_str()).collect();
        assert_eq!(ids, vec!["r", "x", "t"]);
        assert_eq!(
            out[1].kind,
            RenderKind::Placeholder {
                component: "Carousel".into()
            }
        );
        assert_eq!(out[2].props["color"], json!("red"));
    }
}
