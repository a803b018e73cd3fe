use std::fmt;

/// Errors that abort shim synthesis. A partial shim is never produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
  /// Two members asked for the same export symbol.
  DuplicateExport { symbol: String, first: String, second: String },

  /// A member's signature cannot be forwarded from a global function.
  UnsupportedSignature { method: String, reason: String },
}

impl fmt::Display for SynthesisError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      SynthesisError::DuplicateExport { symbol, first, second } => {
        write!(f, "export '{}' is declared by both {} and {}", symbol, first, second)
      },

      SynthesisError::UnsupportedSignature { method, reason } => {
        write!(f, "cannot forward {}: {}", method, reason)
      },
    }
  }
}

impl std::error::Error for SynthesisError {}
