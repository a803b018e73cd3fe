//! Finding the toolchain executables.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use netexport_config::{DebugTrace, ExporterConfig};
use netexport_log::trace_dbg;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{Tool, ToolchainError};

/// Install trees are deep but bounded; this keeps the walk from wandering.
const MAX_SEARCH_DEPTH: usize = 8;

pub trait ToolLocator {
  fn locate(
    &mut self,
    tool: Tool,
  ) -> Result<PathBuf, ToolchainError>;
}

/// `<user cache dir>/netexport/toolchain.json`
pub fn default_cache_path() -> Option<PathBuf> {
  dirs::cache_dir().map(|dir| dir.join("netexport").join("toolchain.json"))
}

/// Tool locations remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCache {
  pub tools: BTreeMap<String, PathBuf>,
}

impl ToolCache {
  /// Reads the cache. A missing or unreadable file is an empty cache.
  pub fn load(path: &Path) -> Self {
    std::fs::read_to_string(path)
      .ok()
      .and_then(|text| serde_json::from_str(&text).ok())
      .unwrap_or_default()
  }

  pub fn save(
    &self,
    path: &Path,
  ) -> io::Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let text = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
    std::fs::write(path, text)
  }

  /// The remembered path, if it still points at a file.
  pub fn get(
    &self,
    tool: Tool,
  ) -> Option<&PathBuf> {
    self.tools.get(tool.program()).filter(|path| path.is_file())
  }

  pub fn insert(
    &mut self,
    tool: Tool,
    path: PathBuf,
  ) {
    self.tools.insert(tool.program().to_string(), path);
  }
}

/// Directories where SDKs and the .NET Framework install their tools.
pub fn sdk_roots() -> Vec<PathBuf> {
  let mut roots = Vec::new();

  for var in ["ProgramFiles(x86)", "ProgramFiles"] {
    if let Some(base) = std::env::var_os(var).map(PathBuf::from) {
      roots.push(base.join("Microsoft SDKs").join("Windows"));
      roots.push(base.join("Microsoft Visual Studio"));
    }
  }

  if let Some(windir) = std::env::var_os("windir").map(PathBuf::from) {
    roots.push(windir.join("Microsoft.NET").join("Framework64"));
    roots.push(windir.join("Microsoft.NET").join("Framework"));
  }

  roots
}

/// Looks for every tool from scratch and records what it finds.
///
/// Order: settings override, environment variable, `PATH`, SDK install roots.
pub struct RescanLocator<'c> {
  config: &'c ExporterConfig,
  roots: Vec<PathBuf>,
  search_path: bool,
  cache_path: Option<PathBuf>,
}

impl<'c> RescanLocator<'c> {
  pub fn new(config: &'c ExporterConfig) -> Self {
    Self {
      config,
      roots: sdk_roots(),
      search_path: true,
      cache_path: default_cache_path(),
    }
  }

  pub fn with_roots(
    mut self,
    roots: Vec<PathBuf>,
  ) -> Self {
    self.roots = roots;
    self
  }

  pub fn with_cache_path(
    mut self,
    cache_path: Option<PathBuf>,
  ) -> Self {
    self.cache_path = cache_path;
    self
  }

  /// Skips the `PATH` lookup, so only configured locations and roots count.
  pub fn without_path_search(mut self) -> Self {
    self.search_path = false;
    self
  }

  pub fn cache_path(&self) -> Option<&Path> {
    self.cache_path.as_deref()
  }

  fn find(
    &self,
    tool: Tool,
  ) -> Option<PathBuf> {
    if let Some(path) = tool.configured(&self.config.tools) {
      trace_dbg!(self.config, DebugTrace::Tools, "{} from settings: {}", tool, path.display());
      return Some(path.clone());
    }

    if let Some(path) = std::env::var_os(tool.env_var()).map(PathBuf::from) {
      trace_dbg!(self.config, DebugTrace::Tools, "{} from {}: {}", tool, tool.env_var(), path.display());
      return Some(path);
    }

    if self.search_path {
      if let Ok(path) = which::which(tool.program()) {
        trace_dbg!(self.config, DebugTrace::Tools, "{} on PATH: {}", tool, path.display());
        return Some(path);
      }
    }

    let found = search_roots(&self.roots, &tool.executable());
    if let Some(path) = &found {
      trace_dbg!(self.config, DebugTrace::Tools, "{} under SDK root: {}", tool, path.display());
    }
    found
  }

  fn remember(
    &self,
    tool: Tool,
    path: &Path,
  ) {
    let Some(cache_path) = &self.cache_path else {
      return;
    };

    let mut cache = ToolCache::load(cache_path);
    cache.insert(tool, path.to_path_buf());

    // A cache that cannot be written only costs a rescan next time.
    if let Err(err) = cache.save(cache_path) {
      trace_dbg!(self.config, DebugTrace::Tools, "cannot write {}: {}", cache_path.display(), err);
    }
  }
}

impl ToolLocator for RescanLocator<'_> {
  fn locate(
    &mut self,
    tool: Tool,
  ) -> Result<PathBuf, ToolchainError> {
    let path = self.find(tool).ok_or(ToolchainError::NotFound { tool })?;
    self.remember(tool, &path);
    Ok(path)
  }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
  Text(String),
  Number(u64),
}

/// Splits a path into text and number runs so `v10.0A` sorts after `v8.1A`.
fn natural_key(path: &Path) -> Vec<Chunk> {
  let text = path.to_string_lossy().to_lowercase();
  let mut chunks = Vec::new();
  let mut chars = text.chars().peekable();

  while let Some(&c) = chars.peek() {
    let digits = c.is_ascii_digit();
    let mut run = String::new();
    while let Some(&c) = chars.peek() {
      if c.is_ascii_digit() != digits {
        break;
      }
      run.push(c);
      chars.next();
    }

    chunks.push(match run.parse() {
      Ok(number) if digits => Chunk::Number(number),
      _ => Chunk::Text(run),
    });
  }

  chunks
}

/// The most recent `executable` below any of `roots`.
///
/// Install directories carry versions in their names, so the highest version wins.
fn search_roots(
  roots: &[PathBuf],
  executable: &str,
) -> Option<PathBuf> {
  roots
    .iter()
    .filter(|root| root.is_dir())
    .flat_map(|root| {
      WalkDir::new(root)
        .max_depth(MAX_SEARCH_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
    })
    .filter(|entry| entry.file_type().is_file())
    .filter(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(executable))
    .map(|entry| entry.into_path())
    .max_by_key(|path| natural_key(path))
}

/// Answers from the tool cache and rescans only for tools it does not know.
pub struct CachedLocator<'c> {
  cache: ToolCache,
  rescan: RescanLocator<'c>,
}

impl<'c> CachedLocator<'c> {
  pub fn new(rescan: RescanLocator<'c>) -> Self {
    let cache = rescan.cache_path().map(ToolCache::load).unwrap_or_default();
    Self { cache, rescan }
  }
}

impl ToolLocator for CachedLocator<'_> {
  fn locate(
    &mut self,
    tool: Tool,
  ) -> Result<PathBuf, ToolchainError> {
    // Settings always win over what an earlier run remembered.
    if let Some(path) = tool.configured(&self.rescan.config.tools) {
      return Ok(path.clone());
    }

    if let Some(path) = self.cache.get(tool) {
      trace_dbg!(self.rescan.config, DebugTrace::Tools, "{} from cache: {}", tool, path.display());
      return Ok(path.clone());
    }

    let path = self.rescan.locate(tool)?;
    self.cache.insert(tool, path.clone());
    Ok(path)
  }
}

/// Picks the locator for this run: `--rescan-tools` bypasses the cache.
pub fn locator_for(config: &ExporterConfig) -> Box<dyn ToolLocator + '_> {
  let rescan = RescanLocator::new(config);

  if config.rescan_tools {
    Box::new(rescan)
  } else {
    Box::new(CachedLocator::new(rescan))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
  }

  #[test]
  fn test_settings_override_wins() {
    let mut config = ExporterConfig::default();
    config.tools.ilasm = Some(PathBuf::from("/opt/tools/ilasm"));

    let mut locator = RescanLocator::new(&config)
      .with_roots(vec![])
      .with_cache_path(None)
      .without_path_search();

    assert_eq!(locator.locate(Tool::Assembler).unwrap(), PathBuf::from("/opt/tools/ilasm"));
  }

  #[test]
  fn test_latest_install_wins() {
    let dir = tempfile::tempdir().unwrap();
    let exe = Tool::Disassembler.executable();
    touch(&dir.path().join("v10.0A").join("bin").join(&exe));
    touch(&dir.path().join("v8.1A").join("bin").join(&exe));

    let config = ExporterConfig::default();
    let mut locator = RescanLocator::new(&config)
      .with_roots(vec![dir.path().to_path_buf()])
      .with_cache_path(None)
      .without_path_search();

    let found = locator.locate(Tool::Disassembler).unwrap();
    assert!(found.starts_with(dir.path().join("v10.0A")));
  }

  #[test]
  fn test_natural_ordering() {
    assert!(natural_key(Path::new("v10.0A")) > natural_key(Path::new("v8.1A")));
    assert!(natural_key(Path::new("NETFX 4.8 Tools")) > natural_key(Path::new("NETFX 4.7.2 Tools")));
  }

  #[test]
  fn test_missing_tool() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExporterConfig::default();
    let mut locator = RescanLocator::new(&config)
      .with_roots(vec![dir.path().to_path_buf()])
      .with_cache_path(None)
      .without_path_search();

    let err = locator.locate(Tool::Librarian).unwrap_err();
    assert!(matches!(err, ToolchainError::NotFound { tool: Tool::Librarian }));
  }

  #[test]
  fn test_rescan_fills_cache_and_cache_answers() {
    let dir = tempfile::tempdir().unwrap();
    let exe = Tool::Assembler.executable();
    let tool_path = dir.path().join("sdk").join(&exe);
    touch(&tool_path);
    let cache_path = dir.path().join("cache").join("toolchain.json");

    let config = ExporterConfig::default();
    let mut rescan = RescanLocator::new(&config)
      .with_roots(vec![dir.path().join("sdk")])
      .with_cache_path(Some(cache_path.clone()))
      .without_path_search();
    assert_eq!(rescan.locate(Tool::Assembler).unwrap(), tool_path);

    let cache = ToolCache::load(&cache_path);
    assert_eq!(cache.get(Tool::Assembler), Some(&tool_path));

    // No roots left: only the cache can answer.
    let mut cached = CachedLocator::new(
      RescanLocator::new(&config)
        .with_roots(vec![])
        .with_cache_path(Some(cache_path.clone()))
        .without_path_search(),
    );
    assert_eq!(cached.locate(Tool::Assembler).unwrap(), tool_path);
  }

  #[test]
  fn test_stale_cache_entries_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("toolchain.json");

    let mut cache = ToolCache::default();
    cache.insert(Tool::Disassembler, dir.path().join("gone").join("ildasm"));
    cache.save(&cache_path).unwrap();

    let reloaded = ToolCache::load(&cache_path);
    assert_eq!(reloaded.tools.len(), 1);
    assert_eq!(reloaded.get(Tool::Disassembler), None);
  }

  #[test]
  fn test_corrupt_cache_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("toolchain.json");
    fs::write(&cache_path, "{ not json").unwrap();

    assert_eq!(ToolCache::load(&cache_path), ToolCache::default());
  }
}
