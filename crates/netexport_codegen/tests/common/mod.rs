use std::fmt::Write;

use netexport_codegen::{ShimModule, ShimOptions, ShimTarget, SynthesisError, SynthesisSession};
use netexport_config::{ExportAttributeConfig, ExporterConfig, Platform};
use netexport_metadata::{
  AttributeNamePredicate, AttributeValue, CustomAttribute, DecodeError, DecodedAttribute, MethodDef, read_module, scan,
};

/// `CallingConvention` values as stored in attribute blobs.
pub const CDECL: u8 = 2;
pub const STDCALL: u8 = 3;

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

/// A listing with one exported static method per entry, each taking `arity` int32 parameters.
pub fn listing(
  methods: &[(String, usize)],
  convention: u8,
) -> String {
  let mut source = String::new();
  writeln!(source, ".assembly extern mscorlib {{ .ver 4:0:0:0 }}").unwrap();
  writeln!(source, ".assembly Sample {{ .ver 1:0:0:0 }}").unwrap();
  writeln!(source, ".module Sample.dll").unwrap();
  writeln!(source, ".class public auto ansi Sample.Exports extends [mscorlib]System.Object").unwrap();
  writeln!(source, "{{").unwrap();

  for (name, arity) in methods {
    let params: Vec<_> = (0..*arity).map(|i| format!("int32 p{}", i)).collect();
    writeln!(source, "  .method public hidebysig static int32 {}({}) cil managed", name, params.join(", ")).unwrap();
    writeln!(source, "  {{").unwrap();
    writeln!(
      source,
      "    .custom instance void DllExportAttribute::.ctor(string, valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( {} )",
      export_blob(name, convention)
    )
    .unwrap();
    writeln!(source, "    ldc.i4.0").unwrap();
    writeln!(source, "    ret").unwrap();
    writeln!(source, "  }}").unwrap();
  }

  writeln!(source, "}}").unwrap();
  source
}

/// Attribute values as the compiled module holds them: every method is exported
/// under its own name with `convention`.
pub fn exported_as_named(convention: u8) -> impl Fn(&MethodDef, usize, &CustomAttribute) -> Result<DecodedAttribute, DecodeError> {
  move |method: &MethodDef, _: usize, _: &CustomAttribute| {
    Ok(DecodedAttribute::new(vec![
      AttributeValue::String(Some(method.name.clone())),
      AttributeValue::Int(i64::from(convention)),
    ]))
  }
}

/// Read, scan and synthesize a merged shim.
pub fn synthesize(
  source: &str,
  convention: u8,
  platform: Platform,
) -> Result<ShimModule, SynthesisError> {
  let module = read_module(source).expect("listing should parse");
  let config = ExporterConfig::default();
  let values = ExportAttributeConfig::default();
  let predicate = AttributeNamePredicate::from_config(&values);
  let attributes = exported_as_named(convention);

  let options = ShimOptions {
    platform,
    target: ShimTarget::Merged,
  };
  let mut session = SynthesisSession::open(&module, options, &config);
  for member in scan(&module, &predicate, &attributes, &values) {
    session.add(&member.expect("member should be exportable"))?;
  }

  Ok(session.finish())
}
