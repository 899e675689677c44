//! Error types for the listing-site client.

/// Errors that can occur when fetching listing pages.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (network error, timeout, or unreadable body).
    #[error("Request failed")]
    RequestFailed,
    /// The site returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The configured base URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
