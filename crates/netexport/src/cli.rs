use std::path::PathBuf;

use clap::{ColorChoice, Parser, ValueEnum};
use netexport_config::{DebugTrace, Platform};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum DebugTraceCli {
  /// Attribute matching and skipped members
  Scan,
  /// Native type mapping and header declarations
  Types,
  /// Forwarding function synthesis
  Synth,
  /// IL merge
  Merge,
  /// Tool lookup and invocations
  Tools,
}

impl From<DebugTraceCli> for DebugTrace {
  fn from(value: DebugTraceCli) -> DebugTrace {
    match value {
      DebugTraceCli::Scan => DebugTrace::Scan,
      DebugTraceCli::Types => DebugTrace::Types,
      DebugTraceCli::Synth => DebugTrace::Synth,
      DebugTraceCli::Merge => DebugTrace::Merge,
      DebugTraceCli::Tools => DebugTrace::Tools,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum PlatformCli {
  /// 32-bit; stdcall exports get an `@bytes` suffix
  X86,
  /// 64-bit
  X64,
}

impl From<PlatformCli> for Platform {
  fn from(value: PlatformCli) -> Platform {
    match value {
      PlatformCli::X86 => Platform::X86,
      PlatformCli::X64 => Platform::X64,
    }
  }
}

#[derive(Parser, Debug)]
#[command(version, about = "Native export thunks for .NET assemblies", long_about = None)]
#[command(color = ColorChoice::Always)]
pub struct Cli {
  /// The managed module to process
  pub inputs: Vec<PathBuf>,

  /// Merge the exports into the original module instead of writing a separate shim
  #[arg(long)]
  pub merge: bool,

  /// Keep intermediate IL and resource files
  #[arg(long)]
  pub keep_temp_files: bool,

  /// Ignore cached tool locations and search again
  #[arg(long)]
  pub rescan_tools: bool,

  /// Don't print the banner
  #[arg(long)]
  pub nologo: bool,

  /// Path of the module to write
  #[arg(long, value_name = "PATH")]
  pub output_filename: Option<PathBuf>,

  /// Write a .def file and an import library next to the output
  #[arg(long)]
  pub create_lib: bool,

  /// Target architecture (default: x86, or [build] platform in netexport.toml)
  #[arg(long, value_enum)]
  pub platform: Option<PlatformCli>,

  /// Write a C header declaring the exports
  #[arg(long, value_name = "PATH")]
  pub create_header: Option<PathBuf>,

  /// Print an example of exporting methods and exit
  #[arg(long = "sampleusage")]
  pub sample_usage: bool,

  /// Print the export attribute class to add to a project and exit
  #[arg(long = "sampleclass")]
  pub sample_class: bool,

  /// Assemble with debug symbols and enable all debug traces
  #[arg(long, default_value = "false")]
  pub debug: bool,

  /// Enable debug tracing for subsystems
  #[arg(long, value_enum, action = clap::ArgAction::Append)]
  pub debug_trace: Vec<DebugTraceCli>,

  /// Don't print any output
  #[arg(long, short = 'q', default_value = "false")]
  pub quiet: bool,

  /// Use verbose output
  #[arg(long, short, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

/// Help and version requests succeed; every other parse failure is fatal.
pub fn exit_code_for(err: &clap::Error) -> i32 {
  match err.kind() {
    clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
    _ => 1,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_equals_forms() {
    let cli = Cli::try_parse_from([
      "netexport",
      "--platform=x64",
      "--output-filename=out.dll",
      "--create-header=Exports.h",
      "--create-lib",
      "--merge",
      "Sample.dll",
    ])
    .unwrap();

    assert_eq!(cli.platform, Some(PlatformCli::X64));
    assert_eq!(cli.output_filename, Some(PathBuf::from("out.dll")));
    assert_eq!(cli.create_header, Some(PathBuf::from("Exports.h")));
    assert!(cli.create_lib);
    assert!(cli.merge);
    assert_eq!(cli.inputs, vec![PathBuf::from("Sample.dll")]);
  }

  #[test]
  fn test_sample_switches() {
    let cli = Cli::try_parse_from(["netexport", "--sampleusage", "--sampleclass", "--nologo"]).unwrap();
    assert!(cli.sample_usage);
    assert!(cli.sample_class);
    assert!(cli.nologo);
    assert!(cli.inputs.is_empty());
  }

  #[test]
  fn test_several_positionals_parse() {
    let cli = Cli::try_parse_from(["netexport", "a.dll", "b.dll"]).unwrap();
    assert_eq!(cli.inputs.len(), 2);
  }

  #[test]
  fn test_exit_codes() {
    let help = Cli::try_parse_from(["netexport", "--help"]).unwrap_err();
    assert_eq!(exit_code_for(&help), 0);

    let unknown = Cli::try_parse_from(["netexport", "--frobnicate", "a.dll"]).unwrap_err();
    assert_eq!(exit_code_for(&unknown), 1);

    let platform = Cli::try_parse_from(["netexport", "--platform=arm", "a.dll"]).unwrap_err();
    assert_eq!(exit_code_for(&platform), 1);
  }

  #[test]
  fn test_traces_and_verbosity() {
    let cli = Cli::try_parse_from(["netexport", "-vv", "--debug-trace", "merge", "--debug-trace", "tools", "a.dll"]).unwrap();
    assert_eq!(cli.verbose, 2);
    let traces: Vec<DebugTrace> = cli.debug_trace.iter().copied().map(Into::into).collect();
    assert_eq!(traces, vec![DebugTrace::Merge, DebugTrace::Tools]);
  }
}
