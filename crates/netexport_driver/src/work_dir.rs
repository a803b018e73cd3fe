use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const PREFIX: &str = "netexport-";

/// Scratch directory for one run's intermediate files, and the working
/// directory of the tools it runs.
///
/// Files are deleted as soon as the step that needs them is done, unless the
/// run keeps temporary files. A directory that is not kept disappears with
/// everything in it when finished or dropped; a kept one survives failures too.
#[derive(Debug)]
pub struct WorkDir {
  dir: TempDir,
  keep: bool,
}

impl WorkDir {
  pub fn create(keep: bool) -> io::Result<Self> {
    let dir = tempfile::Builder::new().prefix(PREFIX).tempdir()?;
    Ok(Self::wrap(dir, keep))
  }

  pub fn create_in(
    parent: &Path,
    keep: bool,
  ) -> io::Result<Self> {
    let dir = tempfile::Builder::new().prefix(PREFIX).tempdir_in(parent)?;
    Ok(Self::wrap(dir, keep))
  }

  fn wrap(
    mut dir: TempDir,
    keep: bool,
  ) -> Self {
    dir.disable_cleanup(keep);
    Self { dir, keep }
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  pub fn file(
    &self,
    name: &str,
  ) -> PathBuf {
    self.dir.path().join(name)
  }

  pub fn write(
    &self,
    name: &str,
    contents: &str,
  ) -> io::Result<PathBuf> {
    let path = self.file(name);
    std::fs::write(&path, contents)?;
    Ok(path)
  }

  /// Deletes an intermediate file unless files are kept. Missing files are fine.
  pub fn discard(
    &self,
    path: &Path,
  ) -> io::Result<()> {
    if self.keep {
      return Ok(());
    }

    match std::fs::remove_file(path) {
      Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
      _ => Ok(()),
    }
  }

  /// Ends the run. Returns the kept files, sorted, and removes the directory
  /// when nothing is kept. Files the tools left behind are only kept on request.
  pub fn finish(self) -> io::Result<Vec<PathBuf>> {
    if !self.keep {
      self.dir.close()?;
      return Ok(vec![]);
    }

    let mut remaining: Vec<_> = std::fs::read_dir(self.dir.path())?
      .map(|entry| entry.map(|entry| entry.path()))
      .collect::<io::Result<_>>()?;
    remaining.sort();

    if remaining.is_empty() {
      self.dir.close()?;
    } else {
      let _ = self.dir.keep();
    }

    Ok(remaining)
  }
}
