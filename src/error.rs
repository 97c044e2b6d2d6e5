//! Centralized error type for the humtone umbrella crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected outright (as opposed to clamped fields,
    /// which are logged and repaired in place).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
