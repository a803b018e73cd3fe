//! Error types for reading disassembled IL and the module image.

use std::fmt;

/// Errors that make an IL listing unusable as module metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
  /// A token did not fit the declaration being read.
  UnexpectedToken { expected: String, found: String, line: usize },

  /// The listing ended inside a declaration.
  UnexpectedEof { expected: String },

  /// The listing declares no `.assembly`, so it is not a module manifest.
  MissingAssembly,

  /// The module already carries exports written by this tool.
  AlreadyProcessed { assembly: String },

  /// The compiled module could not be loaded for attribute values.
  Image { message: String },
}

impl fmt::Display for MetadataError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      MetadataError::UnexpectedToken { expected, found, line } => {
        write!(f, "line {}: expected {}, found '{}'", line, expected, found)
      },

      MetadataError::UnexpectedEof { expected } => {
        write!(f, "unexpected end of listing, expected {}", expected)
      },

      MetadataError::MissingAssembly => write!(f, "no assembly manifest in listing"),

      MetadataError::AlreadyProcessed { assembly } => {
        write!(f, "assembly '{}' already contains native exports", assembly)
      },

      MetadataError::Image { message } => write!(f, "cannot load module image: {}", message),
    }
  }
}

impl std::error::Error for MetadataError {}
