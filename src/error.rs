use thiserror::Error;

/// Errors raised while building, opening or scanning a particle database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected end of database file at byte {offset}")]
    Truncated { offset: u64 },
    #[error("Corrupt database file: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
