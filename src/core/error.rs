use thiserror::Error;

use super::types::{Level, Role};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("level {level} missing from the {table} table")]
    MissingLevel { table: &'static str, level: Level },

    #[error("role {role} missing from the {table} table")]
    MissingRole { table: &'static str, role: Role },

    #[error("invalid {file}: {message}")]
    InvalidTable { file: String, message: String },

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
