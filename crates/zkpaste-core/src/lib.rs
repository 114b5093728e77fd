pub mod config;
pub mod error;
pub mod language;
pub mod types;

pub use error::{PasteError, PasteResult};
pub use language::Language;
