use std::fmt;
use std::path::PathBuf;

use super::Tool;

#[derive(Debug)]
pub enum ToolchainError {
  /// No override, environment variable, `PATH` entry or SDK install provides the tool.
  NotFound { tool: Tool },

  /// The executable could not be started.
  Spawn {
    tool: Tool,
    program: PathBuf,
    source: std::io::Error,
  },

  /// The tool ran and reported failure.
  Failed {
    tool: Tool,
    exit_code: Option<i32>,
    output: String,
  },
}

impl fmt::Display for ToolchainError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      ToolchainError::NotFound { tool } => {
        write!(
          f,
          "cannot find {} (set {} or add it under [tools] in netexport.toml)",
          tool.executable(),
          tool.env_var()
        )
      },

      ToolchainError::Spawn { tool, program, source } => {
        write!(f, "failed to run {} at '{}': {}", tool, program.display(), source)
      },

      ToolchainError::Failed {
        tool,
        exit_code,
        output,
      } => {
        match exit_code {
          Some(code) => write!(f, "{} failed with exit code {}", tool, code)?,
          None => write!(f, "{} was terminated by a signal", tool)?,
        }

        if !output.trim().is_empty() {
          write!(f, ":\n{}", output.trim())?;
        }

        Ok(())
      },
    }
  }
}

impl std::error::Error for ToolchainError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ToolchainError::Spawn { source, .. } => Some(source),
      _ => None,
    }
  }
}
