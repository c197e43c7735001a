//! `{cfg.*}` placeholder parsing and substitution for command templates.
//!
//! Rule producers return raw command templates; before serialization every
//! embedded `{cfg.<dotted.path>}` placeholder is resolved against the
//! configuration tree and replaced with the value's string form.
//!
//! # Placeholder Format
//!
//! - `{cfg.cc.exe}` - the scalar at path `cc.exe`
//!
//! Only the exact prefix `{cfg.` opens a placeholder; all other braces pass
//! through unchanged, so shell constructs and manifest variables like
//! `$out` or `${root}` need no escaping.
//!
//! # Escaping
//!
//! Double the brace (`{{cfg.`) to produce a literal `{cfg.` sequence. This
//! is only needed in the rare case where that exact text must survive into
//! the manifest.
//!
//! # Resolution Modes
//!
//! [`ResolveMode::Strict`] (the default) fails on a missing or non-scalar
//! reference. [`ResolveMode::Lax`] mirrors vivifying-read semantics: the
//! missing path materializes as an empty table on the configuration and the
//! empty string is substituted.
//!
//! # Example
//!
//! ```
//! use genja_lib::config::Config;
//! use genja_lib::template::{expand, ResolveMode};
//!
//! let mut config = Config::new();
//! config.set("cc.exe", "cl");
//! let command = expand("{cfg.cc.exe} /c /Fo$out $in", &mut config, ResolveMode::Strict).unwrap();
//! assert_eq!(command, "cl /c /Fo$out $in");
//! ```

use thiserror::Error;

use crate::config::{Config, Node};

const OPEN: &str = "{cfg.";

/// A segment of a parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders).
  Literal(String),

  /// A configuration reference, held as the dotted path after `cfg.`.
  Ref(String),
}

/// Errors raised during template parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at byte {0}")]
  Unclosed(usize),

  #[error("malformed placeholder path: {0:?}")]
  Malformed(String),

  #[error("unresolved configuration reference: cfg.{0}")]
  Unresolved(String),

  #[error("configuration reference cfg.{0} is not a scalar value")]
  NotScalar(String),
}

/// How unresolved references are handled during substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolveMode {
  /// Fail on a missing or non-scalar reference.
  #[default]
  Strict,

  /// Vivify missing references as empty tables and substitute the empty
  /// string.
  Lax,
}

/// Parse a template into literal and reference segments.
///
/// # Errors
///
/// Returns an error if a placeholder is unclosed or its path is malformed
/// (empty, an empty segment, whitespace, or a nested brace).
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut cursor = 0;

  while let Some(found) = input[cursor..].find(OPEN) {
    let at = cursor + found;

    // A doubled brace escapes the opener: "{{cfg." renders "{cfg.".
    if input[..at].ends_with('{') {
      literal.push_str(&input[cursor..at - 1]);
      literal.push_str(OPEN);
      cursor = at + OPEN.len();
      continue;
    }

    literal.push_str(&input[cursor..at]);
    let body_start = at + OPEN.len();
    let Some(close) = input[body_start..].find('}') else {
      return Err(TemplateError::Unclosed(at));
    };
    let path = &input[body_start..body_start + close];
    validate_path(path)?;

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Ref(path.to_string()));
    cursor = body_start + close + 1;
  }

  literal.push_str(&input[cursor..]);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn validate_path(path: &str) -> Result<(), TemplateError> {
  if path.is_empty() || path.split('.').any(|segment| segment.is_empty()) {
    return Err(TemplateError::Malformed(path.to_string()));
  }
  if path.chars().any(|c| c.is_whitespace() || c == '{') {
    return Err(TemplateError::Malformed(path.to_string()));
  }
  Ok(())
}

/// Parse and substitute in one step.
///
/// # Errors
///
/// Returns an error if parsing fails or, in strict mode, if any reference
/// cannot be resolved to a scalar.
pub fn expand(input: &str, config: &mut Config, mode: ResolveMode) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  expand_segments(&segments, config, mode)
}

/// Substitute pre-parsed segments against a configuration tree.
pub fn expand_segments(
  segments: &[Segment],
  config: &mut Config,
  mode: ResolveMode,
) -> Result<String, TemplateError> {
  let mut result = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(text) => result.push_str(text),
      Segment::Ref(path) => result.push_str(&resolve(config, path, mode)?),
    }
  }
  Ok(result)
}

fn resolve(config: &mut Config, path: &str, mode: ResolveMode) -> Result<String, TemplateError> {
  match mode {
    ResolveMode::Strict => match config.get(path) {
      Some(Node::Value(value)) => Ok(value.to_string()),
      Some(Node::Table(_)) => Err(TemplateError::NotScalar(path.to_string())),
      None => Err(TemplateError::Unresolved(path.to_string())),
    },
    ResolveMode::Lax => match config.read_vivify(path) {
      Some(Node::Value(value)) => Ok(value.to_string()),
      Some(Node::Table(_)) => Ok(String::new()),
      // A scalar mid-path blocks the descent even in lax mode.
      None => Err(TemplateError::NotScalar(path.to_string())),
    },
  }
}
