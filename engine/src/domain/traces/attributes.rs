//! Span attribute codec.
//!
//! Span attributes arrive as a nested JSON tree but are addressed by dotted
//! paths such as `retrieval.documents.0.document.content`. This module
//! converts between the two shapes:
//!
//! - [`flatten`] walks a tree lazily and yields `(path, leaf)` pairs
//! - [`unflatten`] rebuilds a tree from pairs through an index-aware trie
//! - [`get_attribute_value`] looks up a dotted key through nested objects
//!
//! `unflatten` never drops data. When a key would extend a path that already
//! holds a value, the remainder is stored as a dotted sibling key at the level
//! of that value, e.g. `[("a", {"b": 1}), ("a.b", 2)]` becomes
//! `{"a": {"b": 1}, "a.b": 2}`.

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value as JsonValue};

/// Default path separator
pub const DEFAULT_SEPARATOR: &str = ".";

/// Attribute path suffixes that are stored as JSON strings instead of being
/// flattened into individual leaves.
pub const JSON_STRING_ATTRIBUTES: &[&str] =
    &["metadata", "llm.prompt_template.variables", "tool.parameters"];

/// Options for [`flatten`].
#[derive(Debug, Clone)]
pub struct FlattenOptions {
    pub separator: String,
    /// Index into sequences that contain objects. Sequences of scalars are
    /// always yielded whole.
    pub recurse_on_sequence: bool,
    /// Serialize objects found under [`JSON_STRING_ATTRIBUTES`] to a string.
    pub json_string_attributes: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            recurse_on_sequence: true,
            json_string_attributes: false,
        }
    }
}

// ============================================================================
// Flatten
// ============================================================================

/// Flatten a nested attribute tree into dotted `(path, value)` pairs.
///
/// The returned iterator is lazy and single-pass. Null leaves are skipped.
pub fn flatten<'a>(tree: &'a JsonValue, options: &'a FlattenOptions) -> Flatten<'a> {
    let mut stack = Vec::new();
    match tree {
        JsonValue::Object(map) => stack.push(Frame::Object {
            prefix: String::new(),
            iter: map.iter(),
        }),
        JsonValue::Array(items) if has_object(items) => stack.push(Frame::Array {
            prefix: String::new(),
            iter: items.iter().enumerate(),
        }),
        _ => {}
    }
    Flatten { options, stack }
}

/// Lazy iterator returned by [`flatten`].
pub struct Flatten<'a> {
    options: &'a FlattenOptions,
    stack: Vec<Frame<'a>>,
}

enum Frame<'a> {
    Object {
        prefix: String,
        iter: serde_json::map::Iter<'a>,
    },
    Array {
        prefix: String,
        iter: std::iter::Enumerate<std::slice::Iter<'a, JsonValue>>,
    },
}

impl Flatten<'_> {
    fn join(&self, prefix: &str, segment: &str) -> String {
        if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{prefix}{}{segment}", self.options.separator)
        }
    }

    fn is_json_string_attribute(&self, key: &str) -> bool {
        self.options.json_string_attributes
            && JSON_STRING_ATTRIBUTES
                .iter()
                .any(|suffix| key.ends_with(suffix))
    }
}

impl Iterator for Flatten<'_> {
    type Item = (String, JsonValue);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next_child = match self.stack.last_mut()? {
                Frame::Object { prefix, iter } => iter
                    .next()
                    .map(|(key, value)| (prefix.clone(), key.clone(), value)),
                Frame::Array { prefix, iter } => iter
                    .next()
                    .map(|(index, value)| (prefix.clone(), index.to_string(), value)),
            };

            let Some((prefix, segment, value)) = next_child else {
                self.stack.pop();
                continue;
            };
            let in_array = matches!(self.stack.last(), Some(Frame::Array { .. }));
            let key = self.join(&prefix, &segment);

            match value {
                JsonValue::Object(map) => {
                    if !in_array && self.is_json_string_attribute(&key) {
                        return Some((key, JsonValue::String(value.to_string())));
                    }
                    self.stack.push(Frame::Object {
                        prefix: key,
                        iter: map.iter(),
                    });
                }
                // Only objects are addressable inside a sequence
                _ if in_array => {}
                JsonValue::Array(items) if self.options.recurse_on_sequence => {
                    if !has_object(items) {
                        return Some((key, value.clone()));
                    }
                    self.stack.push(Frame::Array {
                        prefix: key,
                        iter: items.iter().enumerate(),
                    });
                }
                JsonValue::Null => {}
                _ => return Some((key, value.clone())),
            }
        }
    }
}

fn has_object(items: &[JsonValue]) -> bool {
    items.iter().any(JsonValue::is_object)
}

// ============================================================================
// Unflatten
// ============================================================================

/// Rebuild a nested attribute tree from dotted `(path, value)` pairs.
///
/// A path segment becomes a list index only when it is all digits, is not the
/// last segment, and no value has been stored at its parent. Lists are ordered
/// by ascending index. Null values are skipped. Segments are trimmed and empty
/// segments are ignored.
pub fn unflatten<I, K>(pairs: I, separator: &str) -> Map<String, JsonValue>
where
    I: IntoIterator<Item = (K, JsonValue)>,
    K: AsRef<str>,
{
    let mut root = Trie::default();
    for (key, value) in pairs {
        if value.is_null() {
            continue;
        }
        let segments: Vec<&str> = key
            .as_ref()
            .split(separator)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut node = &mut root;
        for segment in parents {
            node = match parse_index(segment) {
                Some(index) => node.add_index(index),
                None => node.add_branch(Segment::Key((*segment).to_string())),
            };
        }
        node.add_branch(Segment::Key((*last).to_string()))
            .set_value(value);
    }

    let mut out = Map::new();
    root.walk("", separator, false, &mut out);
    out
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Index(usize),
    Key(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(index) => write!(f, "{index}"),
            Segment::Key(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Default)]
struct Trie {
    value: Option<JsonValue>,
    /// Children that render as list elements
    indices: BTreeSet<usize>,
    /// Children that render as keys, in first-seen order
    branches: Vec<Segment>,
    children: FxHashMap<Segment, Trie>,
}

impl Trie {
    fn add_index(&mut self, index: usize) -> &mut Trie {
        let segment = Segment::Index(index);
        if self.value.is_some() {
            self.push_branch(segment.clone());
        } else if !self.branches.contains(&segment) {
            self.indices.insert(index);
        }
        self.children.entry(segment).or_default()
    }

    fn add_branch(&mut self, segment: Segment) -> &mut Trie {
        self.push_branch(segment.clone());
        self.children.entry(segment).or_default()
    }

    fn push_branch(&mut self, segment: Segment) {
        if let Segment::Index(index) = &segment {
            self.indices.remove(index);
        }
        if !self.branches.contains(&segment) {
            self.branches.push(segment);
        }
    }

    /// A valued node is terminal; list children it already had are demoted to
    /// dotted keys.
    fn set_value(&mut self, value: JsonValue) {
        self.value = Some(value);
        let demoted = std::mem::take(&mut self.indices);
        for index in demoted {
            self.push_branch(Segment::Index(index));
        }
    }

    /// Emit this node under `prefix`. Below a valued ancestor every leaf is
    /// emitted as a fully dotted key at the level of that ancestor.
    fn walk(
        &self,
        prefix: &str,
        separator: &str,
        under_terminal: bool,
        out: &mut Map<String, JsonValue>,
    ) {
        if let Some(value) = &self.value {
            out.insert(prefix.to_string(), value.clone());
        } else if under_terminal {
            for index in &self.indices {
                if let Some(child) = self.children.get(&Segment::Index(*index)) {
                    child.walk(&child_key(prefix, separator, index), separator, true, out);
                }
            }
        } else if !self.indices.is_empty() {
            if prefix.is_empty() {
                for index in &self.indices {
                    if let Some(child) = self.children.get(&Segment::Index(*index)) {
                        child.walk(&index.to_string(), separator, false, out);
                    }
                }
            } else {
                let items = self
                    .indices
                    .iter()
                    .filter_map(|index| self.children.get(&Segment::Index(*index)))
                    .map(|child| {
                        let mut element = Map::new();
                        child.walk("", separator, false, &mut element);
                        JsonValue::Object(element)
                    })
                    .collect();
                out.insert(prefix.to_string(), JsonValue::Array(items));
            }
        } else if !prefix.is_empty() {
            let mut nested = Map::new();
            self.walk("", separator, false, &mut nested);
            out.insert(prefix.to_string(), JsonValue::Object(nested));
            return;
        }

        let flat = under_terminal || self.value.is_some();
        for branch in &self.branches {
            if let Some(child) = self.children.get(branch) {
                child.walk(&child_key(prefix, separator, branch), separator, flat, out);
            }
        }
    }
}

fn child_key(prefix: &str, separator: &str, segment: impl fmt::Display) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{separator}{segment}")
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Look up a dotted key through nested objects. Sequences are not entered.
///
/// Returns `None` for missing keys and for malformed keys (empty, leading,
/// trailing or doubled separators).
pub fn get_attribute_value<'a>(
    attributes: &'a Map<String, JsonValue>,
    key: &str,
    separator: &str,
) -> Option<&'a JsonValue> {
    let mut segments = key.split(separator);
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = attributes.get(first)?;
    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
#[path = "attributes_tests.rs"]
mod tests;
