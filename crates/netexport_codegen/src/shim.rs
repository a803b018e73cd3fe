//! Forwarding shim synthesis.
//!
//! A session collects one forwarding function per exportable member and
//! renders them as IL text. Each function is a global static method that
//! carries an `.export` directive, loads its arguments and calls the original
//! method, so the assembler emits the native entry point directly.

use std::fmt::Write;

use netexport_config::{DebugTrace, ExporterConfig, Platform};
use netexport_log::trace_dbg;
use netexport_metadata::model::{CustomAttribute, ParamDef};
use netexport_metadata::types::{CustomModifier, quote_identifier};
use netexport_metadata::{CallingConvention, ExportableMember, ManagedType, ModuleMetadata, TypeRef};

use crate::errors::SynthesisError;
use crate::exports::{ExportList, export_symbol};
use crate::header::{HeaderBuffer, declaration};
use crate::type_map::TypeMapper;

/// Line that opens the global methods section in disassembler output.
pub const GLOBAL_METHODS_BANNER: &str = "// =============== GLOBAL FIELDS AND METHODS ===================";

/// Line that closes the global methods section.
pub const END_OF_GLOBAL_METHODS: &str = "// ============== END OF GLOBAL METHODS ==============";

/// Image flags for a module with native exports: never `ILONLY`, and 32-bit only on x86.
pub fn corflags(platform: Platform) -> &'static str {
  match platform {
    Platform::X86 => "0x00000002",
    Platform::X64 => "0x00000000",
  }
}

/// Where the forwarding functions will live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShimTarget {
  /// A separate assembly that references the original one.
  Standalone { assembly_name: String, module_name: String },
  /// Spliced into the original module, so calls stay local.
  Merged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimOptions {
  pub platform: Platform,
  pub target: ShimTarget,
}

/// One forwarding function, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimExport {
  pub index: usize,
  pub symbol: String,
  pub convention: CallingConvention,
  /// `Type::Method` the function forwards to.
  pub target: String,
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct ShimModule {
  pub il: String,
  pub header: String,
  pub exports: ExportList,
  pub functions: Vec<ShimExport>,
}

/// Owns all synthesis state for one run: open, add every member, finish once.
pub struct SynthesisSession<'m, 'c> {
  module: &'m ModuleMetadata,
  config: &'c ExporterConfig,
  options: ShimOptions,
  original: String,
  mapper: TypeMapper<'m>,
  header: HeaderBuffer,
  exports: ExportList,
  methods: Vec<String>,
  functions: Vec<ShimExport>,
}

impl<'m, 'c> SynthesisSession<'m, 'c> {
  pub fn open(
    module: &'m ModuleMetadata,
    options: ShimOptions,
    config: &'c ExporterConfig,
  ) -> Self {
    let original = module.assembly_name().unwrap_or_default().to_string();

    Self {
      module,
      config,
      options,
      mapper: TypeMapper::new(module),
      header: HeaderBuffer::new(&original),
      original,
      exports: ExportList::new(),
      methods: Vec::new(),
      functions: Vec::new(),
    }
  }

  /// Adds the forwarding function for `member`.
  ///
  /// Errors are fatal for the whole session.
  pub fn add(
    &mut self,
    member: &ExportableMember<'_>,
  ) -> Result<(), SynthesisError> {
    let owner = format!("{}::{}", member.declaring_type.name, member.method.name);
    let signature = member.signature;

    if signature.instance {
      return Err(SynthesisError::UnsupportedSignature {
        method: owner,
        reason: "instance calling convention on a static method".to_string(),
      });
    }

    let symbol = export_symbol(
      &member.exported_name,
      member.calling_convention,
      &signature.params,
      self.options.platform,
      self.module,
    );
    self.exports.push(&symbol, &owner)?;

    let decl = declaration(
      &mut self.mapper,
      &member.exported_name,
      member.calling_convention,
      signature,
    );
    trace_dbg!(self.config, DebugTrace::Types, "{}", decl);
    self.header.push(decl);

    let index = self.functions.len() + 1;
    let method = self.forwarder(index, &symbol, member);
    trace_dbg!(self.config, DebugTrace::Synth, "[{}] {} forwards to {}", index, symbol, owner);

    self.methods.push(method);
    self.functions.push(ShimExport {
      index,
      symbol,
      convention: member.calling_convention,
      target: owner,
    });

    Ok(())
  }

  /// Seals the session and renders its outputs.
  pub fn finish(self) -> ShimModule {
    let mut il = String::new();

    match &self.options.target {
      ShimTarget::Standalone {
        assembly_name,
        module_name,
      } => {
        writeln!(il, "// Forwarding shim for {}, generated by netexport.", self.original).unwrap();
        writeln!(il).unwrap();
        self.write_manifest(&mut il, assembly_name, module_name);
      },
      ShimTarget::Merged => {
        writeln!(il, "// Forwarding methods for {}, generated by netexport.", self.original).unwrap();
      },
    }

    writeln!(il).unwrap();
    writeln!(il, "{}", GLOBAL_METHODS_BANNER).unwrap();
    writeln!(il).unwrap();
    for method in &self.methods {
      writeln!(il, "{}", method).unwrap();
    }
    writeln!(il, "{}", END_OF_GLOBAL_METHODS).unwrap();

    let header = self.header.finish(self.mapper.typedefs());

    ShimModule {
      il,
      header,
      exports: self.exports,
      functions: self.functions,
    }
  }

  fn write_manifest(
    &self,
    il: &mut String,
    assembly_name: &str,
    module_name: &str,
  ) {
    for reference in &self.module.extern_assemblies {
      writeln!(il, ".assembly extern {}", quote_identifier(&reference.name)).unwrap();
      writeln!(il, "{{{}}}", reference.body).unwrap();
    }

    let version = self.module.assembly.as_ref().and_then(|a| a.version.as_deref());

    writeln!(il, ".assembly extern {}", quote_identifier(&self.original)).unwrap();
    writeln!(il, "{{").unwrap();
    if let Some(version) = version {
      writeln!(il, "  .ver {}", version).unwrap();
    }
    writeln!(il, "}}").unwrap();

    writeln!(il, ".assembly {}", quote_identifier(assembly_name)).unwrap();
    writeln!(il, "{{").unwrap();
    if let Some(version) = version {
      writeln!(il, "  .ver {}", version).unwrap();
    }
    writeln!(il, "}}").unwrap();

    writeln!(il, ".module {}", quote_identifier(module_name)).unwrap();
    writeln!(il, ".imagebase 0x10000000").unwrap();
    writeln!(il, ".file alignment 0x00000200").unwrap();
    writeln!(il, ".stackreserve 0x00100000").unwrap();
    writeln!(il, ".subsystem 0x0003").unwrap();
    writeln!(il, ".corflags {}", corflags(self.options.platform)).unwrap();
  }

  /// Scope for types of the original module, when the shim lives elsewhere.
  fn foreign_scope(&self) -> Option<&str> {
    match self.options.target {
      ShimTarget::Standalone { .. } => Some(&self.original),
      ShimTarget::Merged => None,
    }
  }

  fn qualify(
    &self,
    ty: &ManagedType,
  ) -> ManagedType {
    match self.foreign_scope() {
      Some(scope) => ty.requalify(scope),
      None => ty.clone(),
    }
  }

  fn forwarder(
    &self,
    index: usize,
    symbol: &str,
    member: &ExportableMember<'_>,
  ) -> String {
    let signature = member.signature;
    let corlib = self.module.core_library();

    let return_type = ManagedType::Modified {
      inner: Box::new(self.qualify(&signature.return_type)),
      modifier: CustomModifier {
        required: false,
        type_ref: TypeRef::new(Some(corlib), member.calling_convention.marker_type()),
      },
    };

    let mut head = format!(".method public static {}", return_type);
    if let Some(marshal) = &signature.return_marshal {
      write!(head, " {}", marshal).unwrap();
    }

    let params: Vec<_> = signature.params.iter().map(|param| self.render_param(param)).collect();
    let name = quote_identifier(&member.exported_name);

    let mut method = String::new();
    writeln!(method, "{} {}({}) cil managed", head, name, params.join(", ")).unwrap();
    writeln!(method, "{{").unwrap();
    writeln!(method, "  .export [{}] as {}", index, quote_identifier(symbol)).unwrap();

    if !member.method.return_attributes.is_empty() {
      self.write_param_attributes(&mut method, 0, &member.method.return_attributes);
    }
    for (i, param) in signature.params.iter().enumerate() {
      if !param.custom_attributes.is_empty() {
        self.write_param_attributes(&mut method, i + 1, &param.custom_attributes);
      }
    }

    writeln!(method, "  .maxstack {}", signature.params.len().max(1)).unwrap();
    for i in 0..signature.params.len() {
      writeln!(method, "  {}", load_argument(i)).unwrap();
    }

    let declaring = TypeRef {
      scope: self.foreign_scope().map(str::to_string),
      name: member.declaring_type.name.clone(),
    };
    let call_params: Vec<_> = signature
      .params
      .iter()
      .map(|param| self.qualify(&param.type_).to_string())
      .collect();

    writeln!(
      method,
      "  call {} {}::{}({})",
      self.qualify(&signature.return_type),
      declaring,
      quote_identifier(&member.method.name),
      call_params.join(", ")
    )
    .unwrap();
    writeln!(method, "  ret").unwrap();
    write!(method, "}}").unwrap();

    method
  }

  fn render_param(
    &self,
    param: &ParamDef,
  ) -> String {
    let mut text = String::new();

    for flag in &param.flags {
      write!(text, "[{}] ", flag).unwrap();
    }
    write!(text, "{}", self.qualify(&param.type_)).unwrap();
    if let Some(marshal) = &param.marshal {
      write!(text, " {}", marshal).unwrap();
    }
    if let Some(name) = &param.name {
      write!(text, " {}", quote_identifier(name)).unwrap();
    }

    text
  }

  fn write_param_attributes(
    &self,
    method: &mut String,
    sequence: usize,
    attributes: &[CustomAttribute],
  ) {
    writeln!(method, "  .param [{}]", sequence).unwrap();

    for attribute in attributes {
      // Attributes read from a non-blob form cannot be reproduced.
      let Some(value) = &attribute.value else {
        continue;
      };

      let attribute_type = match self.foreign_scope() {
        Some(scope) => attribute.attribute_type.with_default_scope(scope),
        None => attribute.attribute_type.clone(),
      };
      let ctor_params: Vec<_> = attribute
        .ctor_params
        .iter()
        .map(|param| self.qualify(param).to_string())
        .collect();
      let bytes: Vec<_> = value.iter().map(|byte| format!("{:02X}", byte)).collect();

      writeln!(
        method,
        "  .custom instance void {}::.ctor({}) = ( {} )",
        attribute_type,
        ctor_params.join(", "),
        bytes.join(" ")
      )
      .unwrap();
    }
  }
}

fn load_argument(index: usize) -> String {
  match index {
    0..=3 => format!("ldarg.{}", index),
    4..=255 => format!("ldarg.s {}", index),
    _ => format!("ldarg {}", index),
  }
}
