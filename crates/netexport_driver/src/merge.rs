//! Text-level merge of synthesized IL into a disassembled module.
//!
//! The disassembler output is treated as stable, line-oriented text. Nothing
//! here validates IL beyond finding the lines it splices around.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use netexport_codegen::{END_OF_GLOBAL_METHODS, corflags};
use netexport_config::Platform;
use regex::Regex;

/// A string load that carries an export directive, optionally labelled.
pub const MARKER_PATTERN: &str = r#"(?:IL_[0-9A-Fa-f]+:\s*)?ldstr\s+"(\.export \[\d+\] as [^"]*)""#;

static MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(MARKER_PATTERN).expect("marker regex init failed"));

static CORFLAGS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)\.corflags[ \t]+[^\r\n]*").expect("corflags regex init failed"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
  /// The shim declares no methods.
  MissingMethods,

  /// The shim has no end-of-global-methods line.
  MissingEndMarker,

  /// The original module declares neither a type nor a method.
  NoSpliceTarget,
}

impl fmt::Display for MergeError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      MergeError::MissingMethods => write!(f, "shim IL contains no method declarations"),
      MergeError::MissingEndMarker => {
        write!(f, "shim IL has no '{}' line (unexpected disassembler output)", END_OF_GLOBAL_METHODS)
      },
      MergeError::NoSpliceTarget => write!(f, "original IL declares no type or method to insert before"),
    }
  }
}

impl std::error::Error for MergeError {}

/// Replaces every marker instruction with the export directive it carries.
pub fn rewrite_markers(il: &str) -> Cow<'_, str> {
  MARKER.replace_all(il, "$1")
}

/// Points `.corflags` at the value native exports need on `platform`.
pub fn set_corflags(
  il: &str,
  platform: Platform,
) -> Cow<'_, str> {
  let replacement = format!("${{1}}.corflags {}", corflags(platform));
  CORFLAGS.replace_all(il, replacement.as_str())
}

fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
  let mut offset = 0;
  text.split_inclusive('\n').map(move |line| {
    let start = offset;
    offset += line.len();
    (start, line)
  })
}

fn starts_directive(
  line: &str,
  directive: &str,
) -> bool {
  line
    .trim_start()
    .strip_prefix(directive)
    .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

fn is_type_declaration(line: &str) -> bool {
  starts_directive(line, ".class") && !starts_directive(line.trim_start().trim_start_matches(".class"), "extern")
}

/// The shim's method definitions: from the first `.method` line up to the end-of-global-methods line.
pub fn extract_method_block(shim: &str) -> Result<&str, MergeError> {
  let start = lines_with_offsets(shim)
    .find(|(_, line)| starts_directive(line, ".method"))
    .map(|(offset, _)| offset)
    .ok_or(MergeError::MissingMethods)?;

  let end = lines_with_offsets(&shim[start..])
    .find(|(_, line)| line.trim() == END_OF_GLOBAL_METHODS)
    .map(|(offset, _)| start + offset)
    .ok_or(MergeError::MissingEndMarker)?;

  Ok(&shim[start..end])
}

/// Offset of the first line in `original` that declares a method or a type.
///
/// `.class extern` forwarders in the manifest are not declarations.
pub fn splice_offset(original: &str) -> Result<usize, MergeError> {
  lines_with_offsets(original)
    .find(|(_, line)| starts_directive(line, ".method") || is_type_declaration(line))
    .map(|(offset, _)| offset)
    .ok_or(MergeError::NoSpliceTarget)
}

/// Produces the IL to assemble.
///
/// Without an original the rewritten shim stands alone. With one, the shim's
/// methods are inserted verbatim before the original's first declaration.
pub fn merge(
  shim: &str,
  original: Option<&str>,
) -> Result<String, MergeError> {
  let shim = rewrite_markers(shim);

  let Some(original) = original else {
    return Ok(shim.into_owned());
  };

  let block = extract_method_block(&shim)?;
  let at = splice_offset(original)?;

  let mut merged = String::with_capacity(original.len() + block.len());
  merged.push_str(&original[..at]);
  merged.push_str(block);
  merged.push_str(&original[at..]);
  Ok(merged)
}
