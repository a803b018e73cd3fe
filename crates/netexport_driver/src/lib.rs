//! Runs the export pipeline: toolchain lookup, disassembly, synthesis, merge and reassembly.

pub mod errors;
pub mod merge;
mod pipeline;
pub mod settings;
pub mod toolchain;
pub mod work_dir;

pub use errors::ExportError;
pub use merge::{MergeError, extract_method_block, merge, rewrite_markers, set_corflags, splice_offset};
pub use pipeline::{ExportReport, export_assembly, output_path, print_export_table, run};
