use std::io;
use std::path::Path;
use std::process::Command;

/// Exit status and captured text of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
  /// `None` when the process was killed by a signal.
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }

  /// Both streams, for error reports. The tools print diagnostics to either.
  pub fn combined(&self) -> String {
    match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
      (true, _) => self.stderr.clone(),
      (false, true) => self.stdout.clone(),
      (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
    }
  }
}

/// Runs an external program to completion inside `dir`.
pub trait ToolRunner {
  fn run(
    &mut self,
    program: &Path,
    args: &[String],
    dir: &Path,
  ) -> io::Result<ToolOutput>;
}

/// Runs tools as child processes and blocks until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
  fn run(
    &mut self,
    program: &Path,
    args: &[String],
    dir: &Path,
  ) -> io::Result<ToolOutput> {
    let output = Command::new(program).args(args).current_dir(dir).output()?;

    Ok(ToolOutput {
      exit_code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_combined_output() {
    let output = ToolOutput {
      exit_code: Some(1),
      stdout: "Assembling 'a.il'\n".to_string(),
      stderr: "error: bad token\n".to_string(),
    };
    assert_eq!(output.combined(), "Assembling 'a.il'\nerror: bad token\n");
    assert!(!output.success());

    let quiet = ToolOutput {
      exit_code: Some(0),
      stdout: String::new(),
      stderr: "warning\n".to_string(),
    };
    assert_eq!(quiet.combined(), "warning\n");
    assert!(quiet.success());
  }

  #[test]
  fn test_missing_program_is_a_spawn_error() {
    let mut runner = ProcessRunner;
    let dir = tempfile::tempdir().unwrap();
    let result = runner.run(Path::new("/nonexistent/netexport-tool"), &[], dir.path());
    assert!(result.is_err());
  }

  #[cfg(unix)]
  #[test]
  fn test_tools_run_in_the_given_directory() {
    let mut runner = ProcessRunner;
    let dir = tempfile::tempdir().unwrap();

    let output = runner.run(Path::new("pwd"), &[], dir.path()).unwrap();
    assert!(output.success());
    assert_eq!(
      Path::new(output.stdout.trim()).canonicalize().unwrap(),
      dir.path().canonicalize().unwrap()
    );
  }
}
