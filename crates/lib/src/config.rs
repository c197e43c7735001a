//! Nested configuration tree and the configuration hook registry.
//!
//! # Structure
//!
//! A [`Config`] is a tree of string-keyed entries; each entry holds either a
//! scalar [`Value`] or a nested table. Deep assignment vivifies every
//! intermediate table, so `config.set("cc.flags.opt", "/O2")` needs no
//! explicit initialization of `cc` or `cc.flags`.
//!
//! # Registry
//!
//! Configuration is assembled by a [`ConfigRegistry`]: an ordered list of
//! hooks, each mutating the tree in place. [`ConfigRegistry::run`] creates a
//! fresh root and replays every hook in registration order, so later hooks
//! observe everything earlier hooks wrote. Repeated runs are deterministic
//! but uncached; each produces a new, value-equal tree.
//!
//! # Serialization
//!
//! The tree is fully serializable; tables become JSON objects and scalars
//! their natural JSON forms.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
}

impl Value {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(n) => Some(*n),
      _ => None,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Bool(b) => write!(f, "{}", b),
      Value::Int(n) => write!(f, "{}", n),
      Value::Float(x) => write!(f, "{}", x),
      Value::Str(s) => f.write_str(s),
    }
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Bool(v)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::Int(v)
  }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self {
    Value::Int(v.into())
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Value::Float(v)
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Value::Str(v.to_string())
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::Str(v)
  }
}

/// One entry in the tree: a scalar or a nested table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
  Value(Value),
  Table(Config),
}

/// A nested, string-keyed configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
  entries: BTreeMap<String, Node>,
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Non-vivifying lookup of a dotted path.
  ///
  /// Returns `None` when any segment is missing or when a scalar sits in
  /// the middle of the path.
  pub fn get(&self, path: &str) -> Option<&Node> {
    let mut table = self;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
      let node = table.entries.get(segment)?;
      if segments.peek().is_none() {
        return Some(node);
      }
      match node {
        Node::Table(child) => table = child,
        Node::Value(_) => return None,
      }
    }
    None
  }

  /// Scalar lookup; `None` when the path is missing or holds a table.
  pub fn get_value(&self, path: &str) -> Option<&Value> {
    match self.get(path)? {
      Node::Value(value) => Some(value),
      Node::Table(_) => None,
    }
  }

  /// Deep assignment. Intermediate tables are vivified; whatever sat at the
  /// final segment (scalar or table) is overwritten.
  pub fn set(&mut self, path: &str, value: impl Into<Value>) {
    let (parents, last) = match path.rsplit_once('.') {
      Some((parents, last)) => (parents, last),
      None => ("", path),
    };
    let table = self.table_mut(parents);
    table.entries.insert(last.to_string(), Node::Value(value.into()));
  }

  /// Vivifying descent to a nested table. Missing segments are created
  /// empty; a scalar found at an intermediate segment is overwritten with a
  /// fresh table (explicit writes are last-write-wins). An empty path
  /// returns the root.
  pub fn table_mut(&mut self, path: &str) -> &mut Config {
    let mut table = self;
    if path.is_empty() {
      return table;
    }
    for segment in path.split('.') {
      let node = table
        .entries
        .entry(segment.to_string())
        .or_insert_with(|| Node::Table(Config::new()));
      if let Node::Value(_) = node {
        *node = Node::Table(Config::new());
      }
      table = match node {
        Node::Table(child) => child,
        Node::Value(_) => unreachable!("segment was just normalized to a table"),
      };
    }
    table
  }

  /// Vivifying read: every missing segment (the leaf included) materializes
  /// as an empty table, mirroring how a read of an absent key creates the
  /// child it returns. A scalar found before the final segment stops the
  /// descent and returns `None`; the tree is left untouched past that point.
  pub fn read_vivify(&mut self, path: &str) -> Option<&Node> {
    let mut table = self;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
      let node = table
        .entries
        .entry(segment.to_string())
        .or_insert_with(|| Node::Table(Config::new()));
      if segments.peek().is_none() {
        return Some(node);
      }
      match node {
        Node::Table(child) => table = child,
        Node::Value(_) => return None,
      }
    }
    None
  }
}

type ConfigHook = Box<dyn Fn(&mut Config)>;

/// Ordered list of configuration hooks.
///
/// The registry is owned by the caller and passed around explicitly; there
/// is no process-global state. Registration order is the sole determinant
/// of execution order.
#[derive(Default)]
pub struct ConfigRegistry {
  hooks: Vec<ConfigHook>,
}

impl ConfigRegistry {
  pub fn new() -> Self {
    Self { hooks: Vec::new() }
  }

  /// Append a hook. Has no effect on configurations already produced.
  pub fn register<F>(&mut self, hook: F)
  where
    F: Fn(&mut Config) + 'static,
  {
    self.hooks.push(Box::new(hook));
  }

  pub fn len(&self) -> usize {
    self.hooks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.hooks.is_empty()
  }

  /// Build a fresh configuration by replaying every hook in registration
  /// order. Each hook runs exactly once per call and observes the tree as
  /// mutated by all hooks registered before it.
  pub fn run(&self) -> Config {
    debug!(hooks = self.hooks.len(), "building configuration");
    let mut config = Config::new();
    for hook in &self.hooks {
      hook(&mut config);
    }
    config
  }
}
