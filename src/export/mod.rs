pub mod json;

pub use json::{ExportError, export_set_to_path, import_set};
