//! Error types for the collage client

use thiserror::Error;

/// Result type alias for collage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the backend or building a collage
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure, no response received
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The backend answered with an unexpected status code
    #[error("{endpoint} returned HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// The response body did not have the documented shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Image bytes could not be decoded or encoded
    #[error("Image decode failed: {0}")]
    ImageDecodeError(String),

    /// The grid markup is missing an element the operation relies on
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Markup, selector or inline style could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to rasterize the collage
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures where no usable response came back (transport or status)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::NetworkError(_) | Error::HttpStatus { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageDecodeError(err.to_string())
    }
}
