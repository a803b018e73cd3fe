use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use netexport_config::ExporterConfig;
use netexport_driver::toolchain::{ToolOutput, ToolRunner, Toolchain};
use netexport_metadata::{AttributeSource, AttributeValue, CustomAttribute, DecodeError, DecodedAttribute, MethodDef};

/// Method name, export name and `CallingConvention` value of `twice()`.
pub const TWICE: &[(&str, &str, i64)] = &[("Twice", "Twice", 2)];

/// Hex bytes of a `DllExportAttribute(string, CallingConvention)` blob.
pub fn export_blob(
  name: &str,
  convention: u8,
) -> String {
  let mut bytes = vec![0x01, 0x00, name.len() as u8];
  bytes.extend(name.bytes());
  bytes.extend([convention, 0x00, 0x00, 0x00, 0x00, 0x00]);

  bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

/// Attribute values the compiled module holds, looked up by method name.
pub fn image<'a>(exports: &'a [(&'a str, &'a str, i64)]) -> impl AttributeSource + 'a {
  move |method: &MethodDef, _: usize, _: &CustomAttribute| -> Result<DecodedAttribute, DecodeError> {
    let (_, name, convention) = exports
      .iter()
      .find(|(method_name, ..)| *method_name == method.name)
      .ok_or(DecodeError::UnknownMethod(method.token.unwrap_or_default()))?;

    Ok(DecodedAttribute::new(vec![
      AttributeValue::String(Some(name.to_string())),
      AttributeValue::Enum {
        type_name: "System.Runtime.InteropServices.CallingConvention".to_string(),
        value: *convention,
      },
    ]))
  }
}

/// Disassembly of `Sample.dll` with the given methods inside `Sample.Exports`.
pub fn listing(methods: &str) -> String {
  format!(
    r#"//  Microsoft (R) .NET IL Disassembler.

.assembly extern mscorlib
{{
  .publickeytoken = (B7 7A 5C 56 19 34 E0 89 )
  .ver 4:0:0:0
}}
.assembly Sample
{{
  .hash algorithm 0x00008004
  .ver 1:0:0:0
}}
.module Sample.dll
.imagebase 0x10000000
.file alignment 0x00000200
.stackreserve 0x00100000
.subsystem 0x0003
.corflags 0x00000001    //  ILONLY

// =============== CLASS MEMBERS DECLARATION ===================

.class public auto ansi beforefieldinit Sample.Exports
       extends [mscorlib]System.Object
{{
{}
  .method public hidebysig specialname rtspecialname
          instance void  .ctor() cil managed
  {{
    .maxstack  8
    IL_0000:  ldarg.0
    IL_0001:  call       instance void [mscorlib]System.Object::.ctor()
    IL_0006:  ret
  }} // end of method Exports::.ctor

}} // end of class Sample.Exports
"#,
    methods
  )
}

/// `static int32 Twice(int32 x)` exported under cdecl.
pub fn twice() -> String {
  format!(
    r#"  .method /*06000001*/ public hidebysig static int32  Twice(int32 x) cil managed
  {{
    .custom instance void DllExportAttribute::.ctor(string,
                                                    valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( {} )
    .maxstack  8
    IL_0000:  ldarg.0
    IL_0001:  ldc.i4.2
    IL_0002:  mul
    IL_0003:  ret
  }} // end of method Exports::Twice
"#,
    export_blob("Twice", 2)
  )
}

/// Plays the toolchain without running anything.
///
/// The disassembler writes a canned listing, the assembler copies its IL
/// input to the output path and the librarian copies the definition file.
/// Like the real disassembler, managed resources land in the working directory.
pub struct FakeTools {
  pub listing: String,
  pub with_resource: bool,
  /// File name of a managed resource the disassembler extracts.
  pub managed_resource: Option<&'static str>,
  pub fail: Option<&'static str>,
  pub calls: Vec<String>,
  pub dirs: Vec<PathBuf>,
  pub assembler_args: Vec<String>,
}

impl FakeTools {
  pub fn new(listing: String) -> Self {
    Self {
      listing,
      with_resource: false,
      managed_resource: None,
      fail: None,
      calls: Vec::new(),
      dirs: Vec::new(),
      assembler_args: Vec::new(),
    }
  }
}

fn arg_value<'a>(
  args: &'a [String],
  prefix: &str,
) -> io::Result<&'a str> {
  args
    .iter()
    .find_map(|arg| arg.strip_prefix(prefix))
    .ok_or_else(|| io::Error::other(format!("missing {}", prefix)))
}

impl ToolRunner for FakeTools {
  fn run(
    &mut self,
    program: &Path,
    args: &[String],
    dir: &Path,
  ) -> io::Result<ToolOutput> {
    let name = program.file_stem().unwrap().to_string_lossy().into_owned();
    self.calls.push(name.clone());
    self.dirs.push(dir.to_path_buf());

    if self.fail == Some(name.as_str()) {
      return Ok(ToolOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr: format!("{} exploded", name),
      });
    }

    match name.as_str() {
      "ildasm" => {
        let il = PathBuf::from(arg_value(args, "/OUT=")?);
        fs::write(&il, &self.listing)?;
        if self.with_resource {
          fs::write(il.with_extension("res"), [0u8; 4])?;
        }
        if let Some(resource) = self.managed_resource {
          fs::write(dir.join(resource), [0u8; 4])?;
        }
      },
      "ilasm" => {
        self.assembler_args = args.to_vec();
        if let Some(resource) = self.managed_resource {
          if !dir.join(resource).is_file() {
            return Err(io::Error::other(format!("cannot find {}", resource)));
          }
        }
        let output = arg_value(args, "/OUTPUT=")?;
        let il = args.last().unwrap();
        fs::copy(il, output)?;
      },
      "lib" => {
        let def = arg_value(args, "/DEF:")?;
        let lib = arg_value(args, "/OUT:")?;
        fs::copy(def, lib)?;
      },
      other => panic!("unexpected tool {}", other),
    }

    Ok(ToolOutput {
      exit_code: Some(0),
      stdout: String::new(),
      stderr: String::new(),
    })
  }
}

pub fn toolchain() -> Toolchain {
  Toolchain {
    disassembler: PathBuf::from("ildasm"),
    assembler: PathBuf::from("ilasm"),
    librarian: Some(PathBuf::from("lib")),
  }
}

/// A quiet config for `Sample.dll` in `dir`, with a placeholder module on disk.
pub fn config_in(dir: &Path) -> ExporterConfig {
  let input = dir.join("Sample.dll");
  fs::write(&input, b"MZ original").unwrap();
  ExporterConfig::new_basic(input, false, vec![], true, 0)
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
  let mut names: Vec<_> = fs::read_dir(dir)
    .unwrap()
    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  names
}
