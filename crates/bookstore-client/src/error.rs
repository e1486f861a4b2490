//! Client Errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
