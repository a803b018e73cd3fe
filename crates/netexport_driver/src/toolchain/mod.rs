//! External disassembler, assembler and librarian.
//!
//! Tool locations are resolved once per run through a [`ToolLocator`] and
//! passed around as a [`Toolchain`]. Every invocation goes through a
//! [`ToolRunner`], so tests can stand in for the real executables.

pub mod errors;
pub mod locate;
pub mod runner;

use std::fmt;
use std::path::{Path, PathBuf};

use netexport_config::{DebugTrace, ExporterConfig, Platform, ToolOverrides};
use netexport_log::trace_dbg;

pub use errors::ToolchainError;
pub use locate::{CachedLocator, RescanLocator, ToolCache, ToolLocator, default_cache_path, locator_for};
pub use runner::{ProcessRunner, ToolOutput, ToolRunner};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
  Disassembler,
  Assembler,
  Librarian,
}

impl Tool {
  pub const ALL: [Tool; 3] = [Tool::Disassembler, Tool::Assembler, Tool::Librarian];

  pub fn program(self) -> &'static str {
    match self {
      Tool::Disassembler => "ildasm",
      Tool::Assembler => "ilasm",
      Tool::Librarian => "lib",
    }
  }

  /// File name on disk, with the platform's executable suffix.
  pub fn executable(self) -> String {
    format!("{}{}", self.program(), std::env::consts::EXE_SUFFIX)
  }

  /// Environment variable that points at the executable.
  pub fn env_var(self) -> &'static str {
    match self {
      Tool::Disassembler => "NETEXPORT_ILDASM",
      Tool::Assembler => "NETEXPORT_ILASM",
      Tool::Librarian => "NETEXPORT_LIB",
    }
  }

  pub fn configured(
    self,
    overrides: &ToolOverrides,
  ) -> Option<&PathBuf> {
    match self {
      Tool::Disassembler => overrides.ildasm.as_ref(),
      Tool::Assembler => overrides.ilasm.as_ref(),
      Tool::Librarian => overrides.lib.as_ref(),
    }
  }
}

impl fmt::Display for Tool {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{}", self.program())
  }
}

/// How the assembler should build the output module.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions<'a> {
  pub output: &'a Path,
  pub platform: Platform,
  pub debug: bool,
  /// Win32 resources extracted by the disassembler.
  pub resource: Option<&'a Path>,
}

pub fn disassembler_args(
  module: &Path,
  il: &Path,
) -> Vec<String> {
  vec![
    "/NOBAR".to_string(),
    "/UTF8".to_string(),
    "/TYPELIST".to_string(),
    "/TOKENS".to_string(),
    format!("/OUT={}", il.display()),
    module.display().to_string(),
  ]
}

pub fn assembler_args(
  il: &Path,
  options: &AssembleOptions<'_>,
) -> Vec<String> {
  let mut args = vec![
    "/NOLOGO".to_string(),
    "/QUIET".to_string(),
    "/DLL".to_string(),
    format!("/OUTPUT={}", options.output.display()),
  ];

  if options.debug {
    args.push("/DEBUG".to_string());
  }

  if options.platform == Platform::X64 {
    args.push("/X64".to_string());
    args.push("/PE64".to_string());
  }

  if let Some(resource) = options.resource {
    args.push(format!("/RESOURCE={}", resource.display()));
  }

  args.push(il.display().to_string());
  args
}

pub fn librarian_args(
  def: &Path,
  lib: &Path,
  platform: Platform,
) -> Vec<String> {
  vec![
    "/NOLOGO".to_string(),
    format!("/DEF:{}", def.display()),
    format!("/OUT:{}", lib.display()),
    format!("/MACHINE:{}", platform.machine()),
  ]
}

/// Resolved executables for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  pub disassembler: PathBuf,
  pub assembler: PathBuf,
  /// Only resolved when an import library was requested.
  pub librarian: Option<PathBuf>,
}

impl Toolchain {
  pub fn resolve(
    locator: &mut dyn ToolLocator,
    with_librarian: bool,
  ) -> Result<Self, ToolchainError> {
    let disassembler = locator.locate(Tool::Disassembler)?;
    let assembler = locator.locate(Tool::Assembler)?;
    let librarian = if with_librarian {
      Some(locator.locate(Tool::Librarian)?)
    } else {
      None
    };

    Ok(Self {
      disassembler,
      assembler,
      librarian,
    })
  }

  pub fn path(
    &self,
    tool: Tool,
  ) -> Result<&Path, ToolchainError> {
    match tool {
      Tool::Disassembler => Ok(&self.disassembler),
      Tool::Assembler => Ok(&self.assembler),
      Tool::Librarian => self.librarian.as_deref().ok_or(ToolchainError::NotFound { tool }),
    }
  }

  /// Runs `tool` once in `dir` and fails on a nonzero exit code.
  pub fn invoke(
    &self,
    runner: &mut dyn ToolRunner,
    config: &ExporterConfig,
    dir: &Path,
    tool: Tool,
    args: &[String],
  ) -> Result<ToolOutput, ToolchainError> {
    let program = self.path(tool)?;
    trace_dbg!(config, DebugTrace::Tools, "{} {} (in {})", program.display(), args.join(" "), dir.display());

    let output = runner.run(program, args, dir).map_err(|source| ToolchainError::Spawn {
      tool,
      program: program.to_path_buf(),
      source,
    })?;

    trace_dbg!(config, DebugTrace::Tools, "{} exited with {:?}", tool, output.exit_code);

    if !output.success() {
      return Err(ToolchainError::Failed {
        tool,
        exit_code: output.exit_code,
        output: output.combined(),
      });
    }

    Ok(output)
  }

  pub fn disassemble(
    &self,
    runner: &mut dyn ToolRunner,
    config: &ExporterConfig,
    dir: &Path,
    module: &Path,
    il: &Path,
  ) -> Result<(), ToolchainError> {
    self.invoke(runner, config, dir, Tool::Disassembler, &disassembler_args(module, il))?;
    Ok(())
  }

  /// Runs the assembler in `dir`, where the disassembler left the managed
  /// resources the listing's `.mresource` entries name.
  pub fn assemble(
    &self,
    runner: &mut dyn ToolRunner,
    config: &ExporterConfig,
    dir: &Path,
    il: &Path,
    options: &AssembleOptions<'_>,
  ) -> Result<(), ToolchainError> {
    self.invoke(runner, config, dir, Tool::Assembler, &assembler_args(il, options))?;
    Ok(())
  }

  pub fn create_import_library(
    &self,
    runner: &mut dyn ToolRunner,
    config: &ExporterConfig,
    dir: &Path,
    def: &Path,
    lib: &Path,
  ) -> Result<(), ToolchainError> {
    let args = librarian_args(def, lib, config.platform);
    self.invoke(runner, config, dir, Tool::Librarian, &args)?;
    Ok(())
  }
}
