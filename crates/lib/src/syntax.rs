//! Manifest statement serialization.
//!
//! [`ManifestWriter`] renders the statement grammar the downstream build
//! tool consumes: `rule` blocks with their fixed attribute order, `build`
//! statements with escaped path lists, `pool` declarations, `include` /
//! `subninja` directives, a `default` statement, and comments. All text
//! flows through [`LineWriter`], so any statement may wrap; paths are
//! escaped here so the writer never sees a splittable escaped token it
//! cannot recognize.

use thiserror::Error;

use crate::escape::escape_path;
use crate::writer::{DEFAULT_WIDTH, LineWriter};

/// Errors raised while serializing statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
  /// A statement may never span a raw newline.
  #[error("value for '{key}' contains a raw newline")]
  EmbeddedNewline { key: String },
}

/// Optional attributes of a rule block.
///
/// Attributes left unset (or set to the empty string) are omitted from the
/// rendered block; boolean attributes render as `1` when true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOptions {
  pub description: Option<String>,
  pub depfile: Option<String>,
  pub generator: bool,
  pub pool: Option<String>,
  pub restat: bool,
  pub rspfile: Option<String>,
  pub rspfile_content: Option<String>,
  pub deps: Option<String>,
}

impl RuleOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_description(mut self, text: &str) -> Self {
    self.description = Some(text.to_string());
    self
  }

  pub fn with_depfile(mut self, path: &str) -> Self {
    self.depfile = Some(path.to_string());
    self
  }

  pub fn with_generator(mut self) -> Self {
    self.generator = true;
    self
  }

  pub fn with_pool(mut self, name: &str) -> Self {
    self.pool = Some(name.to_string());
    self
  }

  pub fn with_restat(mut self) -> Self {
    self.restat = true;
    self
  }

  /// Route the command's argument list through a response file.
  pub fn with_rspfile(mut self, path: &str, content: &str) -> Self {
    self.rspfile = Some(path.to_string());
    self.rspfile_content = Some(content.to_string());
    self
  }

  pub fn with_deps(mut self, mode: &str) -> Self {
    self.deps = Some(mode.to_string());
    self
  }
}

/// Serializes manifest statements into an in-memory buffer.
#[derive(Debug, Clone, Default)]
pub struct ManifestWriter {
  w: LineWriter,
}

impl ManifestWriter {
  pub fn new() -> Self {
    Self::with_width(DEFAULT_WIDTH)
  }

  pub fn with_width(width: usize) -> Self {
    Self { w: LineWriter::with_width(width) }
  }

  /// Emit an empty line between blocks.
  pub fn newline(&mut self) {
    self.w.blank();
  }

  pub fn comment(&mut self, text: &str) {
    self.w.comment(text);
  }

  /// Emit a `key = value` line at `indent`. The value passes through
  /// verbatim; an explicitly empty value still emits (an empty binding
  /// resets a variable for the downstream tool).
  pub fn variable(&mut self, key: &str, value: &str, indent: usize) -> Result<(), SyntaxError> {
    ensure_single_line(key, key)?;
    ensure_single_line(key, value)?;
    self.w.line(&format!("{} = {}", key, value), indent);
    Ok(())
  }

  /// Emit a rule block: `rule <name>` plus its attributes in fixed order.
  pub fn rule(&mut self, name: &str, command: &str, options: &RuleOptions) -> Result<(), SyntaxError> {
    ensure_single_line("rule", name)?;
    self.w.line(&format!("rule {}", name), 0);
    self.variable("command", command, 1)?;
    if let Some(description) = non_empty(&options.description) {
      self.variable("description", description, 1)?;
    }
    if let Some(depfile) = non_empty(&options.depfile) {
      self.variable("depfile", depfile, 1)?;
    }
    if options.generator {
      self.variable("generator", "1", 1)?;
    }
    if let Some(pool) = non_empty(&options.pool) {
      self.variable("pool", pool, 1)?;
    }
    if options.restat {
      self.variable("restat", "1", 1)?;
    }
    if let Some(rspfile) = non_empty(&options.rspfile) {
      self.variable("rspfile", rspfile, 1)?;
    }
    if let Some(content) = non_empty(&options.rspfile_content) {
      self.variable("rspfile_content", content, 1)?;
    }
    if let Some(deps) = non_empty(&options.deps) {
      self.variable("deps", deps, 1)?;
    }
    Ok(())
  }

  /// Emit a build statement plus its per-edge variable lines.
  ///
  /// Implicit inputs are preceded by `|`, order-only inputs by `||`. All
  /// paths are escaped; variables are emitted in the order given.
  pub fn build(
    &mut self,
    outputs: &[String],
    rule: &str,
    inputs: &[String],
    implicit: &[String],
    order_only: &[String],
    variables: &[(String, String)],
  ) -> Result<(), SyntaxError> {
    ensure_single_line("build", rule)?;
    for path in outputs.iter().chain(inputs).chain(implicit).chain(order_only) {
      ensure_single_line("build", path)?;
    }

    let outs = outputs.iter().map(|p| escape_path(p)).collect::<Vec<_>>().join(" ");
    let mut tail = String::from(rule);
    for path in inputs {
      tail.push(' ');
      tail.push_str(&escape_path(path));
    }
    if !implicit.is_empty() {
      tail.push_str(" |");
      for path in implicit {
        tail.push(' ');
        tail.push_str(&escape_path(path));
      }
    }
    if !order_only.is_empty() {
      tail.push_str(" ||");
      for path in order_only {
        tail.push(' ');
        tail.push_str(&escape_path(path));
      }
    }

    self.w.line(&format!("build {}: {}", outs, tail), 0);
    for (key, value) in variables {
      self.variable(key, value, 1)?;
    }
    Ok(())
  }

  /// Emit a pool declaration with its depth.
  pub fn pool(&mut self, name: &str, depth: u32) -> Result<(), SyntaxError> {
    ensure_single_line("pool", name)?;
    self.w.line(&format!("pool {}", name), 0);
    self.variable("depth", &depth.to_string(), 1)?;
    Ok(())
  }

  pub fn include(&mut self, path: &str) -> Result<(), SyntaxError> {
    ensure_single_line("include", path)?;
    self.w.line(&format!("include {}", escape_path(path)), 0);
    Ok(())
  }

  pub fn subninja(&mut self, path: &str) -> Result<(), SyntaxError> {
    ensure_single_line("subninja", path)?;
    self.w.line(&format!("subninja {}", escape_path(path)), 0);
    Ok(())
  }

  /// Emit a default-target statement. A no-op for an empty target list.
  pub fn defaults(&mut self, targets: &[String]) -> Result<(), SyntaxError> {
    if targets.is_empty() {
      return Ok(());
    }
    for target in targets {
      ensure_single_line("default", target)?;
    }
    let list = targets.iter().map(|t| escape_path(t)).collect::<Vec<_>>().join(" ");
    self.w.line(&format!("default {}", list), 0);
    Ok(())
  }

  pub fn finish(self) -> String {
    self.w.into_string()
  }
}

/// Return the string slice if the option holds a non-empty value.
///
/// Unset options and those holding the empty string yield `None`, so the
/// corresponding attribute line is omitted from the rendered block.
fn non_empty(value: &Option<String>) -> Option<&str> {
  match value {
    Some(s) if !s.is_empty() => Some(s),
    _ => None,
  }
}

fn ensure_single_line(key: &str, value: &str) -> Result<(), SyntaxError> {
  if value.contains('\n') {
    return Err(SyntaxError::EmbeddedNewline { key: key.to_string() });
  }
  Ok(())
}
