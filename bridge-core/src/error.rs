use thiserror::Error;

use crate::catalog::loader::LoaderError;
use crate::codec::FrameError;
use crate::publish::PublishError;
use crate::template::TemplateRenderError;

/// Errors that can occur in the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("catalog invalid: {0}")]
    CatalogInvalid(String),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("template render error: {0}")]
    Template(#[from] TemplateRenderError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

impl From<LoaderError> for BridgeError {
    fn from(err: LoaderError) -> Self {
        BridgeError::CatalogInvalid(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
