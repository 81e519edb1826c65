pub mod api;
pub mod error;
pub mod models;
pub mod pagination;
pub mod report;
pub mod swap;

pub use error::{DomainError, ParseEnumError};
