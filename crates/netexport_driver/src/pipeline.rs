use std::path::{Path, PathBuf};

use ascii_table::AsciiTable;
use netexport_codegen::{ShimExport, ShimOptions, ShimTarget, SynthesisSession};
use netexport_config::{DebugTrace, ExporterConfig};
use netexport_log::{log_dbg, log_info, log_trc, phase_log, phase_ok, phase_warn, trace_dbg};
use netexport_metadata::model::SHIM_PREFIX;
use netexport_metadata::{AttributeNamePredicate, AttributeSource, ModuleImage, ScanWarning, read_unprocessed, scan};

use crate::errors::{ExportError, IoContext};
use crate::merge::{merge, set_corflags};
use crate::toolchain::{AssembleOptions, ProcessRunner, ToolRunner, Toolchain, locator_for};
use crate::work_dir::WorkDir;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
  pub output: PathBuf,
  pub exports: Vec<ShimExport>,
  pub warnings: Vec<ScanWarning>,
  pub def_file: Option<PathBuf>,
  pub lib_file: Option<PathBuf>,
  pub header_file: Option<PathBuf>,
  /// Temporary files left behind because they were asked to be kept.
  pub kept_files: Vec<PathBuf>,
}

impl ExportReport {
  pub fn symbols(&self) -> Vec<&str> {
    self.exports.iter().map(|export| export.symbol.as_str()).collect()
  }
}

/// Resolves the toolchain and runs the whole pipeline with real processes.
pub fn run(config: &ExporterConfig) -> Result<ExportReport, ExportError> {
  check_input(config)?;

  let mut locator = locator_for(config);
  let toolchain = Toolchain::resolve(locator.as_mut(), config.create_lib)?;
  log_dbg!(config, "ildasm: {}", toolchain.disassembler.display());
  log_dbg!(config, "ilasm: {}", toolchain.assembler.display());

  let image = ModuleImage::load(&config.input).map_err(|source| ExportError::Metadata {
    path: config.input.clone(),
    source,
  })?;

  export_assembly(config, &toolchain, &mut ProcessRunner, &image)
}

fn check_input(config: &ExporterConfig) -> Result<(), ExportError> {
  if !config.input.is_file() {
    return Err(ExportError::InputNotFound {
      path: config.input.clone(),
    });
  }

  Ok(())
}

/// Where the final module goes: the explicit output, the input itself when
/// merging, or `NativeExports.<assembly>.dll` next to the input.
pub fn output_path(
  config: &ExporterConfig,
  assembly: &str,
) -> PathBuf {
  if let Some(output) = &config.output {
    return output.clone();
  }

  if config.merge {
    return config.input.clone();
  }

  let dir = config.input.parent().unwrap_or(Path::new(""));
  dir.join(format!("{}{}.dll", SHIM_PREFIX, assembly))
}

fn same_file(
  a: &Path,
  b: &Path,
) -> bool {
  match (a.canonicalize(), b.canonicalize()) {
    (Ok(a), Ok(b)) => a == b,
    _ => a == b,
  }
}

fn backup_path(input: &Path) -> PathBuf {
  let mut name = input.as_os_str().to_owned();
  name.push(".orig");
  PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<(), ExportError> {
  match std::fs::remove_file(path) {
    Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(ExportError::Io {
      path: path.to_path_buf(),
      source: err,
    }),
    _ => Ok(()),
  }
}

fn write_file(
  path: &Path,
  contents: &str,
) -> Result<(), ExportError> {
  std::fs::write(path, contents).at(path)
}

/// Disassembles the input, synthesizes and merges the shim, then assembles
/// the final module and writes the requested side outputs.
///
/// Export attribute values come from `attributes`. The tools run inside the
/// work directory, so every path handed to them is absolute.
pub fn export_assembly(
  config: &ExporterConfig,
  toolchain: &Toolchain,
  runner: &mut dyn ToolRunner,
  attributes: &dyn AttributeSource,
) -> Result<ExportReport, ExportError> {
  check_input(config)?;
  let input_path = std::path::absolute(&config.input).at(&config.input)?;
  let input = &input_path;

  let work = WorkDir::create(config.keep_temp_files).at(&std::env::temp_dir())?;
  let work_path = work.path().to_path_buf();
  log_dbg!(config, "work directory: {}", work_path.display());

  let stem = input
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "module".to_string());

  phase_log!(config, "Disassembling {}", input.display());
  let original_il_path = work.file(&format!("{}.il", stem));
  let resource_path = original_il_path.with_extension("res");
  toolchain
    .disassemble(runner, config, &work_path, input, &original_il_path)
    .map_err(|source| ExportError::Load {
      path: input.clone(),
      source,
    })?;
  let original_il = std::fs::read_to_string(&original_il_path).at(&original_il_path)?;

  phase_log!(config, "Scanning {}", input.display());
  let module = read_unprocessed(&original_il).map_err(|source| ExportError::Metadata {
    path: input.clone(),
    source,
  })?;
  let assembly = module.assembly_name().unwrap_or(stem.as_str()).to_string();
  log_trc!(config, "listing declares {} types", module.types.len());

  let predicate = AttributeNamePredicate::from_config(&config.export);
  let mut members = Vec::new();
  let mut warnings = Vec::new();

  for item in scan(&module, &predicate, attributes, &config.export) {
    match item {
      Ok(member) => {
        trace_dbg!(
          config,
          DebugTrace::Scan,
          "{}::{} exported as {} ({})",
          member.declaring_type.name,
          member.method.name,
          member.exported_name,
          member.calling_convention
        );
        members.push(member);
      },
      Err(warning) => {
        phase_warn!(config, "{}", warning);
        warnings.push(warning);
      },
    }
  }

  if members.is_empty() {
    return Err(ExportError::NoExports { path: input.clone() });
  }

  let target = if config.merge {
    ShimTarget::Merged
  } else {
    ShimTarget::Standalone {
      assembly_name: format!("{}{}", SHIM_PREFIX, assembly),
      module_name: format!("{}{}.dll", SHIM_PREFIX, assembly),
    }
  };

  phase_log!(config, "Synthesizing {} forwarding functions", members.len());
  let options = ShimOptions {
    platform: config.platform,
    target,
  };
  let mut session = SynthesisSession::open(&module, options, config);
  for member in &members {
    session.add(member)?;
  }
  let shim = session.finish();

  let shim_il_path = work.file(&format!("{}{}.il", SHIM_PREFIX, stem));
  write_file(&shim_il_path, &shim.il)?;

  phase_log!(config, "Merging IL");
  let mut final_il = merge(&shim.il, config.merge.then_some(original_il.as_str()))?;
  if config.merge {
    final_il = set_corflags(&final_il, config.platform).into_owned();
  }
  trace_dbg!(config, DebugTrace::Merge, "final IL is {} bytes", final_il.len());

  let final_il_path = work.file(&format!("{}.final.il", stem));
  write_file(&final_il_path, &final_il)?;
  work.discard(&shim_il_path).at(&shim_il_path)?;

  let output = output_path(config, &assembly);
  let output = std::path::absolute(&output).at(&output)?;
  if same_file(&output, input) {
    let backup = backup_path(input);
    remove_if_exists(&backup)?;
    std::fs::rename(input, &backup).at(&backup)?;
    log_dbg!(config, "original moved to {}", backup.display());
  }
  remove_if_exists(&output)?;

  phase_log!(config, "Assembling {}", output.display());
  // A standalone shim carries no resources of its own.
  let resource = (config.merge && resource_path.is_file()).then_some(resource_path.as_path());
  let assemble = AssembleOptions {
    output: &output,
    platform: config.platform,
    debug: config.debug,
    resource,
  };
  toolchain.assemble(runner, config, &work_path, &final_il_path, &assemble)?;

  for path in [&final_il_path, &original_il_path, &resource_path] {
    work.discard(path).at(path)?;
  }

  let mut def_file = None;
  let mut lib_file = None;
  if config.create_lib {
    let def = output.with_extension("def");
    let lib = output.with_extension("lib");
    write_file(&def, &shim.exports.to_def())?;

    phase_log!(config, "Creating import library {}", lib.display());
    toolchain.create_import_library(runner, config, &work_path, &def, &lib)?;
    def_file = Some(def);
    lib_file = Some(lib);
  }

  let mut header_file = None;
  if let Some(path) = &config.create_header {
    write_file(path, &shim.header)?;
    phase_log!(config, "Wrote header {}", path.display());
    header_file = Some(path.clone());
  }

  let kept_files = work.finish().at(&work_path)?;
  for path in &kept_files {
    phase_log!(config, "Kept {}", path.display());
  }

  phase_ok!(config, "Wrote {} ({} exports)", output.display(), shim.functions.len());
  if log_info(config) {
    print_export_table(&shim.functions);
  }

  Ok(ExportReport {
    output,
    exports: shim.functions,
    warnings,
    def_file,
    lib_file,
    header_file,
    kept_files,
  })
}

pub fn print_export_table(exports: &[ShimExport]) {
  let mut ascii_table = AsciiTable::default();
  ascii_table.column(0).set_header("#");
  ascii_table.column(1).set_header("Symbol");
  ascii_table.column(2).set_header("Convention");
  ascii_table.column(3).set_header("Forwards to");

  let rows: Vec<Vec<String>> = exports
    .iter()
    .map(|export| {
      vec![
        export.index.to_string(),
        export.symbol.clone(),
        export.convention.to_string(),
        export.target.clone(),
      ]
    })
    .collect();

  ascii_table.print(rows);
}
