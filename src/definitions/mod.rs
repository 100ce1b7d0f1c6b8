//! KDL parsing and rendering for preference definition documents.
//!
//! Definition documents ship with a deployment and describe the initial set
//! of preferences. Each node name is a scope category; properties carry the
//! rest of the definition.
//!
//! # KDL Schema
//!
//! ```kdl
//! preferences {
//!     application key="timeout" type="INT" val="30" minimum=0 maximum=100 {
//!         description "Request timeout in seconds"
//!     }
//!     module owner="INVENTORY" key="page-size" type="INT" val=50
//!     role owner="ROLE_ADMIN" key="dashboard" type="OBJECT" val="{\"tiles\":4}"
//!     user owner="alice" key="theme" type="STRING" val="dark" group="ui"
//! }
//! ```
//!
//! The `preferences` wrapper is optional and may appear more than once;
//! top-level entries beside it are read as well. `val` may also be spelled `value`,
//! and `description` may be a property instead of a child node.

pub mod source;

pub use source::{DefinitionSource, FileSource, InlineSource, SourceDocument, digest};

use crate::models::{DEFAULT_GROUP, PersistedKey, PreferenceDefinition, PreferenceType, Scope};
use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use std::collections::HashSet;

/// Name of the optional wrapper node.
const WRAPPER_NODE: &str = "preferences";

/// A parsed definition document.
///
/// Parsing only checks KDL syntax. Entries are validated lazily by
/// [`DefinitionDocument::definitions`], which can be iterated any number of
/// times with identical results.
#[derive(Debug, Clone)]
pub struct DefinitionDocument {
    name: String,
    doc: KdlDocument,
}

impl DefinitionDocument {
    /// Parse document text. `name` is used to label entries in errors.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let doc: KdlDocument = text.parse().map_err(|e| Error::MalformedDefinition {
            entry: name.clone(),
            reason: format!("invalid KDL: {}", e),
        })?;
        Ok(Self { name, doc })
    }

    /// Document name as given to [`DefinitionDocument::parse`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry nodes in document order. Children of every `preferences` node
    /// are spliced in where the wrapper stands.
    fn entry_nodes(&self) -> Vec<&KdlNode> {
        let mut entries = Vec::new();
        for node in self.doc.nodes() {
            if node.name().value() == WRAPPER_NODE {
                if let Some(children) = node.children() {
                    entries.extend(children.nodes());
                }
            } else {
                entries.push(node);
            }
        }
        entries
    }

    /// All definitions in document order.
    pub fn definitions(&self) -> impl Iterator<Item = Result<PreferenceDefinition>> + '_ {
        self.entry_nodes()
            .into_iter()
            .enumerate()
            .filter_map(move |(index, node)| {
                let name = node.name().value();
                match Scope::parse(name) {
                    Some(scope) if name == scope.as_str() => {
                        Some(parse_entry(node, scope, &self.entry_label(index, node)))
                    }
                    _ => {
                        tracing::debug!(document = %self.name, node = name, "ignoring unknown node");
                        None
                    }
                }
            })
    }

    /// Definitions of one scope category, in document order.
    pub fn definitions_for(
        &self,
        scope: Scope,
    ) -> impl Iterator<Item = Result<PreferenceDefinition>> + '_ {
        self.entry_nodes()
            .into_iter()
            .enumerate()
            .filter(move |(_, node)| node.name().value() == scope.as_str())
            .map(move |(index, node)| parse_entry(node, scope, &self.entry_label(index, node)))
    }

    /// Human-readable label for the entry at `index`.
    fn entry_label(&self, index: usize, node: &KdlNode) -> String {
        let mut label = format!("{}: {} #{}", self.name, node.name().value(), index + 1);
        if let Some(key) = prop(node, "key").and_then(value_text) {
            label.push_str(&format!(" '{}'", key));
        }
        label
    }
}

/// Load every definition in `text`, failing on the first invalid entry.
///
/// Two entries resolving to the same persisted key are rejected; the later
/// one is named in the error.
pub fn load(name: &str, text: &str) -> Result<Vec<PreferenceDefinition>> {
    let document = DefinitionDocument::parse(name, text)?;
    let mut seen: HashSet<PersistedKey> = HashSet::new();
    let mut definitions = Vec::new();

    for def in document.definitions() {
        let def = def?;
        let key = def.persisted_key()?;
        if !seen.insert(key.clone()) {
            return Err(Error::MalformedDefinition {
                entry: format!("{}: {}", name, key),
                reason: "duplicate of an earlier definition".to_string(),
            });
        }
        definitions.push(def);
    }

    Ok(definitions)
}

fn malformed(label: &str, reason: impl Into<String>) -> Error {
    Error::MalformedDefinition {
        entry: label.to_string(),
        reason: reason.into(),
    }
}

/// Parse a single scope node into a definition.
fn parse_entry(node: &KdlNode, scope: Scope, label: &str) -> Result<PreferenceDefinition> {
    let key = prop(node, "key")
        .and_then(value_text)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| malformed(label, "missing required property 'key'"))?;

    let owner = prop(node, "owner").and_then(value_text);
    match (scope.requires_owner(), owner.as_deref()) {
        (true, None) | (true, Some("")) => {
            return Err(malformed(
                label,
                format!("{} preferences require an 'owner'", scope.as_str()),
            ));
        }
        (false, Some(_)) => {
            return Err(malformed(label, "application preferences have no 'owner'"));
        }
        _ => {}
    }

    let type_text = prop(node, "type")
        .and_then(value_text)
        .ok_or_else(|| malformed(label, "missing required property 'type'"))?;
    let pref_type = PreferenceType::parse(&type_text)
        .ok_or_else(|| malformed(label, format!("unknown type '{}'", type_text)))?;

    let value = prop(node, "val")
        .or_else(|| prop(node, "value"))
        .and_then(value_text)
        .unwrap_or_default();

    let description = prop(node, "description").and_then(value_text).or_else(|| {
        node.children()
            .and_then(|c| c.get("description"))
            .and_then(|n| n.entries().first())
            .and_then(|e| value_text(e.value()))
    });

    let minimum = bound(node, "minimum", label)?;
    let maximum = bound(node, "maximum", label)?;
    if (minimum.is_some() || maximum.is_some()) && !pref_type.is_numeric() {
        return Err(malformed(
            label,
            format!("bounds are only allowed on INT and FLOAT, not {}", pref_type),
        ));
    }
    if let (Some(min), Some(max)) = (minimum, maximum)
        && min > max
    {
        return Err(malformed(
            label,
            format!("minimum {} exceeds maximum {}", min, max),
        ));
    }

    let group = prop(node, "group")
        .and_then(value_text)
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| DEFAULT_GROUP.to_string());

    let definition = PreferenceDefinition {
        scope,
        owner,
        key,
        value,
        pref_type,
        description,
        minimum,
        maximum,
        group,
    };

    definition
        .persisted_key()
        .map_err(|e| malformed(label, e.to_string()))?;
    definition
        .typed_value()
        .map_err(|e| malformed(label, e.to_string()))?;

    Ok(definition)
}

/// Find a named property on a node.
fn prop<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(name))
        .map(|e| e.value())
}

/// Textual form of a scalar KDL value. `#null` has none.
fn value_text(value: &KdlValue) -> Option<String> {
    if let Some(s) = value.as_string() {
        Some(s.to_string())
    } else if let Some(i) = value.as_integer() {
        Some(i.to_string())
    } else if let Some(f) = value.as_float() {
        Some(f.to_string())
    } else {
        value.as_bool().map(|b| b.to_string())
    }
}

/// Parse an optional numeric bound, accepting numbers or numeric strings.
fn bound(node: &KdlNode, name: &str, label: &str) -> Result<Option<f64>> {
    let Some(value) = prop(node, name) else {
        return Ok(None);
    };

    let parsed = if let Some(i) = value.as_integer() {
        Some(i as f64)
    } else if let Some(f) = value.as_float() {
        Some(f)
    } else {
        value.as_string().and_then(|s| s.trim().parse::<f64>().ok())
    };

    match parsed {
        Some(x) if x.is_finite() => Ok(Some(x)),
        _ => Err(malformed(label, format!("'{}' is not a number", name))),
    }
}

/// Bounds are written as integers when they have no fractional part.
fn bound_value(x: f64) -> KdlValue {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        KdlValue::Integer(x as i128)
    } else {
        KdlValue::Float(x)
    }
}

/// Render definitions as a KDL document.
///
/// Parsing the result with [`load`] yields the same definitions.
pub fn to_kdl(definitions: &[PreferenceDefinition]) -> KdlDocument {
    let mut entries = KdlDocument::new();

    for def in definitions {
        let mut node = KdlNode::new(def.scope.as_str());
        if let Some(ref owner) = def.owner {
            node.push(KdlEntry::new_prop("owner", KdlValue::String(owner.clone())));
        }
        node.push(KdlEntry::new_prop("key", KdlValue::String(def.key.clone())));
        node.push(KdlEntry::new_prop(
            "type",
            KdlValue::String(def.pref_type.as_str().to_string()),
        ));
        node.push(KdlEntry::new_prop("val", KdlValue::String(def.value.clone())));
        if let Some(min) = def.minimum {
            node.push(KdlEntry::new_prop("minimum", bound_value(min)));
        }
        if let Some(max) = def.maximum {
            node.push(KdlEntry::new_prop("maximum", bound_value(max)));
        }
        if def.group != DEFAULT_GROUP {
            node.push(KdlEntry::new_prop("group", KdlValue::String(def.group.clone())));
        }
        if let Some(ref description) = def.description {
            let mut desc = KdlNode::new("description");
            desc.push(KdlEntry::new(KdlValue::String(description.clone())));
            let mut children = KdlDocument::new();
            children.nodes_mut().push(desc);
            node.set_children(children);
        }
        entries.nodes_mut().push(node);
    }

    let mut wrapper = KdlNode::new(WRAPPER_NODE);
    wrapper.set_children(entries);

    let mut doc = KdlDocument::new();
    doc.nodes_mut().push(wrapper);
    doc.autoformat();
    doc
}

/// Render definitions as KDL text.
pub fn render(definitions: &[PreferenceDefinition]) -> String {
    to_kdl(definitions).to_string()
}
