pub mod error;
pub mod registry;
pub mod types;

pub use error::{Result, ValidatorError};
pub use registry::ValidatorRegistry;
pub use types::Validator;
