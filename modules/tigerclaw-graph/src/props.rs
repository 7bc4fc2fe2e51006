use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltMap, BoltString, BoltType};
use serde::Serialize;

use tigerclaw_common::index::parse_date;
use tigerclaw_common::{Action, Label, PersonType, RelType};

/// Scalar property value stored on a node or edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Float(f) => Some(*f),
            PropValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn to_bolt(&self) -> BoltType {
        match self {
            PropValue::Str(s) => BoltType::String(BoltString::from(s.as_str())),
            PropValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
            PropValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
            PropValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<NaiveDate> for PropValue {
    fn from(v: NaiveDate) -> Self {
        PropValue::Str(v.format("%Y-%m-%d").to_string())
    }
}

impl From<Action> for PropValue {
    fn from(v: Action) -> Self {
        PropValue::Str(v.as_str().to_string())
    }
}

impl From<PersonType> for PropValue {
    fn from(v: PersonType) -> Self {
        PropValue::Str(v.as_str().to_string())
    }
}

/// Property map written with `SET n += $props`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set only when a value is present.
    pub fn with_opt<V: Into<PropValue>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.set(key, v);
        }
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<PropValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str).filter(|s| !s.is_empty())
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PropValue::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropValue::as_bool)
    }

    /// Overlay `other` onto self, like Cypher `SET n += $other`.
    pub fn merge(&mut self, other: &Props) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.0.iter()
    }

    pub fn to_bolt(&self) -> BoltType {
        BoltType::Map(BoltMap::from_iter(
            self.0
                .iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), v.to_bolt())),
        ))
    }
}

impl FromIterator<(String, PropValue)> for Props {
    fn from_iter<T: IntoIterator<Item = (String, PropValue)>>(iter: T) -> Self {
        Props(iter.into_iter().collect())
    }
}

/// Identity of a node: its label plus the value of the label's key field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    pub label: Label,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: Label, key: impl Into<String>) -> Self {
        Self { label, key: key.into() }
    }

    pub fn person(slug: impl Into<String>) -> Self {
        Self::new(Label::Person, slug)
    }

    pub fn company(slug: impl Into<String>) -> Self {
        Self::new(Label::Company, slug)
    }

    pub fn theme(key: impl Into<String>) -> Self {
        Self::new(Label::Theme, key)
    }

    pub fn institution(name: impl Into<String>) -> Self {
        Self::new(Label::Institution, name)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label, self.key)
    }
}

/// A node as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    #[serde(flatten)]
    pub node: NodeRef,
    pub props: Props,
}

impl NodeRecord {
    pub fn new(node: NodeRef, props: Props) -> Self {
        Self { node, props }
    }

    pub fn label(&self) -> Label {
        self.node.label
    }

    pub fn key(&self) -> &str {
        &self.node.key
    }

    pub fn name(&self) -> Option<&str> {
        self.props.str("name")
    }

    /// Name, falling back to title (themes) and then the key.
    pub fn display_name(&self) -> &str {
        self.name()
            .or_else(|| self.props.str("title"))
            .unwrap_or(&self.node.key)
    }

    pub fn action(&self) -> Option<Action> {
        self.props.str("action").and_then(|a| a.parse().ok())
    }

    pub fn theme(&self) -> Option<&str> {
        self.props.str("theme")
    }

    pub fn person_type(&self) -> Option<PersonType> {
        self.props.str("type").and_then(|t| t.parse().ok())
    }

    pub fn last_seen(&self) -> Option<NaiveDate> {
        self.props.str("last_seen").and_then(parse_date)
    }

    pub fn funded(&self) -> Option<bool> {
        self.props.bool("funded")
    }

    pub fn title(&self) -> Option<&str> {
        self.props.str("title")
    }

    pub fn primitive(&self) -> Option<&str> {
        self.props.str("primitive")
    }

    /// Person or Company: the labels that carry pipeline state.
    pub fn is_entity(&self) -> bool {
        matches!(self.node.label, Label::Person | Label::Company)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub from: NodeRef,
    pub rel: RelType,
    pub to: NodeRef,
    pub props: Props,
}

impl EdgeRecord {
    /// The endpoint opposite `node`, if `node` is one of the endpoints.
    pub fn other(&self, node: &NodeRef) -> Option<&NodeRef> {
        if &self.from == node {
            Some(&self.to)
        } else if &self.to == node {
            Some(&self.from)
        } else {
            None
        }
    }
}

/// One relationship seen from a node, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub rel: RelType,
    /// True when the stored edge starts at the node being expanded.
    pub outgoing: bool,
    pub node: NodeRecord,
    pub props: Props,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphCounts {
    pub nodes: BTreeMap<Label, usize>,
    pub edges: BTreeMap<RelType, usize>,
}

impl GraphCounts {
    pub fn total_nodes(&self) -> usize {
        self.nodes.values().sum()
    }

    pub fn total_edges(&self) -> usize {
        self.edges.values().sum()
    }
}
