//! Optional `netexport.toml` next to (or above) the input module.
//!
//! ```toml
//! [export]
//! attributes = ["DllExportAttribute"]
//! name_property = "ExportName"
//! convention_property = "CallingConvention"
//!
//! [tools]
//! ilasm = "C:/Windows/Microsoft.NET/Framework/v4.0.30319/ilasm.exe"
//!
//! [build]
//! platform = "x64"
//! merge = false
//! create_lib = true
//! ```

pub mod config;
pub mod errors;
pub mod find;
pub mod resolve;

pub use config::{BuildSection, SettingsToml};
pub use errors::SettingsError;
pub use find::{SETTINGS_FILE, find_settings_root, load_settings, settings_for};
pub use resolve::{CliOverrides, apply_settings};
