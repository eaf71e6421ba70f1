pub mod file_format;
pub mod log_setup;

pub use file_format::{FileFormatError, FileFormatResult, SerdeFormat};
pub use log_setup::LogSetupError;
