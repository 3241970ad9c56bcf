//! # Component Registry
//!
//! Maps a component type name to its default properties, property schema,
//! and whether it accepts children. Registration is static configuration:
//! the registry is built once and shared read-only by every session.
//!
//! Nodes whose type is missing from the registry are *placeholders*. They
//! stay in the tree, render as an inert box, and can only be deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{TreeError, TreeResult, ValidationWarning};
use crate::node::{Breakpoint, Props};

/// Accepted shape of a property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "camelCase")]
pub enum PropKind {
    String,
    Number,
    Boolean,
    Enum(Vec<String>),
    Any,
}

static ANY_KIND: PropKind = PropKind::Any;

impl PropKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PropKind::String => value.is_string(),
            PropKind::Number => value.is_number(),
            PropKind::Boolean => value.is_boolean(),
            PropKind::Enum(values) => value
                .as_str()
                .map(|s| values.iter().any(|v| v == s))
                .unwrap_or(false),
            PropKind::Any => true,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PropKind::String => "a string".to_string(),
            PropKind::Number => "a number".to_string(),
            PropKind::Boolean => "a boolean".to_string(),
            PropKind::Enum(values) => format!("one of {}", values.join("|")),
            PropKind::Any => "any value".to_string(),
        }
    }
}

/// Registered component type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub default_props: Props,

    #[serde(default)]
    pub prop_schema: BTreeMap<String, PropKind>,

    #[serde(default)]
    pub canvas: bool,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            default_props: Props::new(),
            prop_schema: BTreeMap::new(),
            canvas: false,
        }
    }

    /// Mark the type as able to contain children
    pub fn canvas(mut self) -> Self {
        self.canvas = true;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Declare a prop with its kind and default value
    pub fn with_prop(mut self, name: &str, kind: PropKind, default: impl Into<Value>) -> Self {
        self.prop_schema.insert(name.to_string(), kind);
        self.default_props.insert(name.to_string(), default.into());
        self
    }

    /// Declare a prop that has no default
    pub fn with_optional_prop(mut self, name: &str, kind: PropKind) -> Self {
        self.prop_schema.insert(name.to_string(), kind);
        self
    }

    /// Schema entry for a key. Keys that only carry a default accept anything.
    pub fn kind_of(&self, key: &str) -> Option<&PropKind> {
        self.prop_schema.get(key).or_else(|| {
            if self.default_props.contains_key(key) {
                Some(&ANY_KIND)
            } else {
                None
            }
        })
    }

    /// Shallow-merge `patch` into `target`, checking every key against the
    /// schema.
    ///
    /// - Unknown keys are kept and reported.
    /// - Invalid values are reset: to the default on desktop, or by dropping
    ///   the override key on narrower breakpoints so the cascade applies.
    /// - On narrower breakpoints a `null` value clears the override key.
    pub fn merge_patch(
        &self,
        node_id: &str,
        breakpoint: Breakpoint,
        target: &mut Props,
        patch: &Props,
    ) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (key, value) in patch {
            if breakpoint != Breakpoint::Desktop && value.is_null() {
                target.remove(key);
                continue;
            }

            match self.kind_of(key) {
                None => {
                    warnings.push(ValidationWarning::UnknownProp {
                        node_id: node_id.to_string(),
                        component: self.name.clone(),
                        prop: key.clone(),
                    });
                    target.insert(key.clone(), value.clone());
                }
                Some(kind) if kind.accepts(value) => {
                    target.insert(key.clone(), value.clone());
                }
                Some(kind) => {
                    warnings.push(ValidationWarning::InvalidValue {
                        node_id: node_id.to_string(),
                        prop: key.clone(),
                        expected: kind.describe(),
                        breakpoint,
                    });
                    match (breakpoint, self.default_props.get(key)) {
                        (Breakpoint::Desktop, Some(default)) => {
                            target.insert(key.clone(), default.clone());
                        }
                        _ => {
                            target.remove(key);
                        }
                    }
                }
            }
        }

        warnings
    }
}

/// Registry of component types keyed by type name
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    definitions: BTreeMap<String, ComponentDefinition>,
}

impl ComponentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Storefront palette: Container, Text, Button
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            ComponentDefinition::new("Container")
                .with_display_name("Container")
                .canvas()
                .with_prop("padding", PropKind::String, "p-4")
                .with_prop("background", PropKind::String, "bg-transparent")
                .with_optional_prop("className", PropKind::String),
        );

        registry.register(
            ComponentDefinition::new("Text")
                .with_display_name("Text")
                .with_prop("text", PropKind::String, "Edit me!")
                .with_prop("fontSize", PropKind::String, "text-base")
                .with_prop(
                    "textAlign",
                    PropKind::Enum(vec![
                        "text-left".into(),
                        "text-center".into(),
                        "text-right".into(),
                    ]),
                    "text-left",
                )
                .with_prop("color", PropKind::String, "text-slate-900 dark:text-slate-100"),
        );

        registry.register(
            ComponentDefinition::new("Button")
                .with_display_name("Button")
                .with_prop("children", PropKind::String, "Click Me")
                .with_prop(
                    "variant",
                    PropKind::Enum(vec![
                        "primary".into(),
                        "secondary".into(),
                        "ghost".into(),
                        "outline".into(),
                    ]),
                    "primary",
                )
                .with_prop(
                    "size",
                    PropKind::Enum(vec!["sm".into(), "md".into(), "lg".into()]),
                    "md",
                )
                .with_optional_prop("className", PropKind::String),
        );

        registry
    }

    /// Load definitions from a JSON array
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let definitions: Vec<ComponentDefinition> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        Ok(registry)
    }

    /// Register a type, returning any definition it replaced
    pub fn register(&mut self, definition: ComponentDefinition) -> Option<ComponentDefinition> {
        self.definitions.insert(definition.name.clone(), definition)
    }

    pub fn resolve_type(&self, component: &str) -> TreeResult<&ComponentDefinition> {
        self.definitions
            .get(component)
            .ok_or_else(|| TreeError::UnknownComponent(component.to_string()))
    }

    pub fn contains(&self, component: &str) -> bool {
        self.definitions.contains_key(component)
    }

    /// Whether a node of this type would be a placeholder
    pub fn is_placeholder(&self, component: &str) -> bool {
        !self.contains(component)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// A node needs a registered, canvas-capable type to receive children.
pub(crate) fn accepts_children(
    registry: &ComponentRegistry,
    canvas: bool,
    component: &str,
) -> bool {
    canvas && registry.contains(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_palette() {
        let registry = ComponentRegistry::builtin();
        assert_eq!(registry.len(), 3);

        let container = registry.resolve_type("Container").unwrap();
        assert!(container.canvas);
        assert_eq!(container.default_props["padding"], json!("p-4"));

        let text = registry.resolve_type("Text").unwrap();
        assert!(!text.canvas);
        assert_eq!(text.default_props["text"], json!("Edit me!"));
    }

    #[test]
    fn test_unknown_type_is_reported() {
        let registry = ComponentRegistry::builtin();
        assert_eq!(
            registry.resolve_type("Carousel"),
            Err(TreeError::UnknownComponent("Carousel".to_string()))
        );
        assert!(registry.is_placeholder("Carousel"));
    }

    #[test]
    fn test_merge_patch_flags_unknown_keys() {
        let registry = ComponentRegistry::builtin();
        let text = registry.resolve_type("Text").unwrap();
        let mut target = text.default_props.clone();

        let patch: Props = [("glow".to_string(), json!(true))].into_iter().collect();
        let warnings = text.merge_patch("n1", Breakpoint::Desktop, &mut target, &patch);

        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ValidationWarning::UnknownProp { .. }));
        assert_eq!(target["glow"], json!(true));
    }

    #[test]
    fn test_merge_patch_resets_invalid_values() {
        let registry = ComponentRegistry::builtin();
        let button = registry.resolve_type("Button").unwrap();

        let mut base = button.default_props.clone();
        base.insert("size".into(), json!("lg"));
        let patch: Props = [("size".to_string(), json!("huge"))].into_iter().collect();
        let warnings = button.merge_patch("b1", Breakpoint::Desktop, &mut base, &patch);
        assert_eq!(warnings.len(), 1);
        assert_eq!(base["size"], json!("md"));

        let mut bucket: Props = [("size".to_string(), json!("sm"))].into_iter().collect();
        button.merge_patch("b1", Breakpoint::Mobile, &mut bucket, &patch);
        assert!(!bucket.contains_key("size"));
    }

    #[test]
    fn test_null_clears_override_key() {
        let registry = ComponentRegistry::builtin();
        let text = registry.resolve_type("Text").unwrap();

        let mut bucket: Props = [("color".to_string(), json!("red"))].into_iter().collect();
        let patch: Props = [("color".to_string(), Value::Null)].into_iter().collect();
        let warnings = text.merge_patch("t1", Breakpoint::Tablet, &mut bucket, &patch);

        assert!(warnings.is_empty());
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"[
            {
                "name": "Hero",
                "canvas": true,
                "defaultProps": { "title": "Welcome" },
                "propSchema": {
                    "title": { "kind": "string" },
                    "align": { "kind": "enum", "values": ["left", "center"] }
                }
            }
        ]"#;

        let registry = ComponentRegistry::from_json(json).unwrap();
        let hero = registry.resolve_type("Hero").unwrap();
        assert!(hero.canvas);
        assert_eq!(
            hero.prop_schema["align"],
            PropKind::Enum(vec!["left".into(), "center".into()])
        );
        assert!(hero.kind_of("title").unwrap().accepts(&json!("Hi")));
    }
}
