//! Error types for the SharePoint provider

use thiserror::Error;

/// SharePoint provider errors
#[derive(Error, Debug)]
pub enum SharePointError {
    /// Token acquisition failed or the credentials are invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Graph API request returned an error status
    #[error("Graph API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Item not found on the remote drive
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Result type for SharePoint operations
pub type Result<T> = std::result::Result<T, SharePointError>;
