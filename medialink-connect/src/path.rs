//! Deep-field lookups over JSON documents.
//!
//! A [`FieldPath`] is a short list of steps evaluated against a node set:
//!
//! - `..` replaces every node with itself and all of its descendants
//! - `.Name` (or a leading `Name`) selects the child field `Name` of objects
//! - `[*]` selects every element of arrays
//!
//! `..SpekeKeyProvider.Url` therefore finds every `Url` under any
//! `SpekeKeyProvider` object, at any depth.

use crate::error::{RuleError, RuleResult};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Descend,
    Field(String),
    AnyIndex,
}

/// A compiled deep-field path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    steps: Vec<Step>,
}

impl FieldPath {
    /// Creates an empty path, which selects the document itself.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn descend(mut self) -> Self {
        self.steps.push(Step::Descend);
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Field(name.into()));
        self
    }

    #[must_use]
    pub fn any_index(mut self) -> Self {
        self.steps.push(Step::AnyIndex);
        self
    }

    /// Parses the textual form, e.g. `..Destinations[*].MediaConnectSettings.EntitlementArn`.
    pub fn parse(expr: &str) -> RuleResult<Self> {
        let mut path = Self::new();
        let mut rest = expr.strip_prefix('$').unwrap_or(expr);
        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix("..") {
                path = path.descend();
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("[*]") {
                path = path.any_index();
                rest = tail;
            } else {
                let tail = rest.strip_prefix('.').unwrap_or(rest);
                let end = tail.find(['.', '[']).unwrap_or(tail.len());
                if end == 0 {
                    return Err(RuleError::InvalidData(format!(
                        "bad field path {expr:?}"
                    )));
                }
                path = path.field(&tail[..end]);
                rest = &tail[end..];
            }
        }
        if matches!(path.steps.last(), Some(Step::Descend)) {
            return Err(RuleError::InvalidData(format!(
                "field path {expr:?} ends with a descent"
            )));
        }
        Ok(path)
    }

    /// Every node the path selects, in document order.
    pub fn find<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        let mut nodes = vec![doc];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in nodes {
                match step {
                    Step::Descend => collect_descendants(node, &mut next),
                    Step::Field(name) => {
                        if let Some(child) = node.as_object().and_then(|o| o.get(name)) {
                            next.push(child);
                        }
                    }
                    Step::AnyIndex => {
                        if let Some(items) = node.as_array() {
                            next.extend(items.iter());
                        }
                    }
                }
            }
            nodes = next;
        }
        nodes
    }

    /// The string values among [`find`](Self::find)'s results.
    pub fn find_strings<'a>(&self, doc: &'a Value) -> Vec<&'a str> {
        self.find(doc).into_iter().filter_map(Value::as_str).collect()
    }
}

// Pre-order: the node comes before its children.
fn collect_descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Object(map) => map.values().for_each(|v| collect_descendants(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_descendants(v, out)),
        _ => {}
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        let mut after_descend = false;
        for step in &self.steps {
            match step {
                Step::Descend => f.write_str("..")?,
                Step::Field(name) if after_descend => f.write_str(name)?,
                Step::Field(name) => write!(f, ".{name}")?,
                Step::AnyIndex => f.write_str("[*]")?,
            }
            after_descend = *step == Step::Descend;
        }
        Ok(())
    }
}
