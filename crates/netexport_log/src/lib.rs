//! Logging utilities for netexport.
//!
//! Provides macros for:
//! - Phase logging (`phase_log!`, `phase_ok!`, `phase_warn!`)
//! - Debug traces by category (`trace_dbg!`)
//! - Verbose logging (`log_dbg!`, `log_trc!`)
//!
//! All output goes to stderr so generated text printed on stdout stays clean.

use netexport_config::{DebugTrace, ExporterConfig};

pub fn effective_verbose(config: &ExporterConfig) -> u8 {
  if config.quiet {
    return 0;
  }

  if config.debug && config.verbose < 2 {
    return 2;
  }

  config.verbose
}

pub fn log_phase(config: &ExporterConfig) -> bool {
  !config.quiet
}

pub fn log_info(config: &ExporterConfig) -> bool {
  effective_verbose(config) >= 1
}

pub fn log_debug(config: &ExporterConfig) -> bool {
  effective_verbose(config) >= 2
}

pub fn log_trace(config: &ExporterConfig) -> bool {
  effective_verbose(config) >= 3
}

pub fn debug_trace_enabled(
  config: &ExporterConfig,
  trace: DebugTrace,
) -> bool {
  !config.quiet && (config.debug || config.debug_trace.contains(&trace))
}

/// Returns lowercase name of a DebugTrace variant for log output.
pub fn trace_name(trace: DebugTrace) -> &'static str {
  match trace {
    DebugTrace::Scan => "scan",
    DebugTrace::Types => "types",
    DebugTrace::Synth => "synth",
    DebugTrace::Merge => "merge",
    DebugTrace::Tools => "tools",
  }
}

/// Log a pipeline phase message with an arrow prefix.
///
/// # Examples
///
/// ```ignore
/// phase_log!(&config, "Disassembling {}", path.display());
/// phase_log!(&config, indent = 8, "Sub-step {}", name);
/// ```
#[macro_export]
macro_rules! phase_log {
  ($config:expr, indent = $indent:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!(
        "{:indent$}{} {}",
        "",
        "-->".bright_green().bold(),
        format!($fmt $(, $arg)*),
        indent = $indent
      );
    }
  }};

  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    $crate::phase_log!($config, indent = 4, $fmt $(, $arg)*);
  }};
}

/// Log a successful phase completion (green arrow, no indent).
///
/// # Examples
///
/// ```ignore
/// phase_ok!(&config, "Wrote {}", output.display());
/// ```
#[macro_export]
macro_rules! phase_ok {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("{} {}", "-->".bright_green().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

/// Log a warning during a phase (yellow arrow, no indent).
///
/// # Examples
///
/// ```ignore
/// phase_warn!(&config, "skipping {}: no export name", method);
/// ```
#[macro_export]
macro_rules! phase_warn {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("{} {}", "-->".bright_yellow().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

/// Log a debug trace for a specific pipeline component.
///
/// Output format: `debug[component]: message`
///
/// # Examples
///
/// ```ignore
/// trace_dbg!(&config, DebugTrace::Merge, "splicing at offset {}", offset);
/// // Output: debug[merge]: splicing at offset 1024
/// ```
#[macro_export]
macro_rules! trace_dbg {
  ($config:expr, $trace:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::debug_trace_enabled($config, $trace) {
      eprintln!(
        "debug[{}]: {}",
        $crate::trace_name($trace),
        format!($fmt $(, $arg)*)
      );
    }
  }};
}

/// Log a verbose debug message (verbosity >= 2).
///
/// # Examples
///
/// ```ignore
/// log_dbg!(&config, "work directory: {}", work_path.display());
/// // Output: debug: work directory: /tmp/netexport-a1b2c3
/// ```
#[macro_export]
macro_rules! log_dbg {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_debug($config) {
      eprintln!("debug: {}", format!($fmt $(, $arg)*));
    }
  }};
}

/// Log a trace message (verbosity >= 3).
///
/// # Examples
///
/// ```ignore
/// log_trc!(&config, "listing declares {} types", module.types.len());
/// // Output: trace: listing declares 4 types
/// ```
#[macro_export]
macro_rules! log_trc {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_trace($config) {
      eprintln!("trace: {}", format!($fmt $(, $arg)*));
    }
  }};
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  fn config(
    quiet: bool,
    debug: bool,
    verbose: u8,
  ) -> ExporterConfig {
    ExporterConfig::new_basic(PathBuf::from("a.dll"), debug, vec![], quiet, verbose)
  }

  #[test]
  fn test_quiet_silences_everything() {
    let config = config(true, true, 3);
    assert_eq!(effective_verbose(&config), 0);
    assert!(!log_phase(&config));
    assert!(!debug_trace_enabled(&config, DebugTrace::Scan));
  }

  #[test]
  fn test_debug_raises_verbosity() {
    let config = config(false, true, 0);
    assert_eq!(effective_verbose(&config), 2);
    assert!(log_debug(&config));
    assert!(!log_trace(&config));
    assert!(debug_trace_enabled(&config, DebugTrace::Tools));
  }

  #[test]
  fn test_message_macros_expand_under_every_gate() {
    for verbose in 0..=3 {
      let config = config(false, false, verbose);
      let work_path = PathBuf::from("netexport-a1b2c3");
      log_dbg!(&config, "work directory: {}", work_path.display());
      log_trc!(&config, "listing declares {} types", 4,);
    }

    assert!(log_trace(&config(false, false, 3)));
    assert!(!log_debug(&config(false, false, 1)));
  }

  #[test]
  fn test_trace_selection() {
    let mut config = config(false, false, 1);
    config.debug_trace = vec![DebugTrace::Merge];
    assert!(log_info(&config));
    assert!(debug_trace_enabled(&config, DebugTrace::Merge));
    assert!(!debug_trace_enabled(&config, DebugTrace::Synth));
    assert_eq!(trace_name(DebugTrace::Merge), "merge");
  }
}
