//! Escaping of raw strings into manifest-safe tokens.
//!
//! The build manifest gives `$`, space, and `:` structural meaning inside
//! path lists, so paths must be escaped before they are joined into a
//! statement. Variable values pass through verbatim (`$out` in a command is
//! a manifest variable reference, not text to protect); `escape_value` is
//! the opt-in helper for callers that want a literal `$` to survive.

use thiserror::Error;

/// Errors raised while escaping a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
  /// A statement may never span a raw newline; multi-line output only exists
  /// through controlled line continuation in the writer.
  #[error("manifest values cannot contain newlines: {0:?}")]
  EmbeddedNewline(String),
}

/// Escape a path for use in a build statement's path lists.
///
/// Replacement order matters: `"$ "` must be doubled before plain spaces are
/// escaped, otherwise a space the caller already escaped would end up behind
/// an even run of `$` and lose its escaping.
pub fn escape_path(path: &str) -> String {
  path.replace("$ ", "$$ ").replace(' ', "$ ").replace(':', "$:")
}

/// Escape a value so every `$` in it is literal.
///
/// # Errors
///
/// Returns [`EscapeError::EmbeddedNewline`] if the value contains a newline.
pub fn escape_value(value: &str) -> Result<String, EscapeError> {
  if value.contains('\n') {
    return Err(EscapeError::EmbeddedNewline(value.to_string()));
  }
  Ok(value.replace('$', "$$"))
}
