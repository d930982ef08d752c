pub mod error;
pub mod price;

pub use error::{AppError, ExtractionError};
