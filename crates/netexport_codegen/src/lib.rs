//! Synthesizes forwarding shims, native headers and export lists for exportable members.

pub mod errors;
pub mod exports;
pub mod header;
pub mod shim;
pub mod type_map;

pub use errors::SynthesisError;
pub use exports::{EXPORTS_MARKER, ExportList, export_symbol};
pub use shim::{
  END_OF_GLOBAL_METHODS, GLOBAL_METHODS_BANNER, ShimExport, ShimModule, ShimOptions, ShimTarget, SynthesisSession,
  corflags,
};
pub use type_map::TypeMapper;
