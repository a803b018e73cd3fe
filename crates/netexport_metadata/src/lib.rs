//! Reads disassembled IL into module metadata and selects the methods to export.

pub mod attribute;
pub mod errors;
pub mod image;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod scan;
pub mod token;
pub mod types;

pub use attribute::{AttributeSource, AttributeValue, DecodeError, DecodedAttribute};
pub use errors::MetadataError;
pub use image::ModuleImage;
pub use model::{CustomAttribute, MethodDef, MethodSignature, ModuleMetadata, ParamDef, TypeDef};
pub use parser::{read_module, read_unprocessed};
pub use scan::{AttributeNamePredicate, CallingConvention, ExportPredicate, ExportableMember, ScanWarning, scan};
pub use types::{ManagedType, MarshalHint, TypeRef};
