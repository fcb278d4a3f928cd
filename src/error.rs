use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Neither a parcel nor a project identifier could be found on the page.
    #[error("No project/parcel identifier found on the page")]
    NoContext,

    /// The screenshot session failed or returned an empty payload.
    #[error("Screenshot capture failed: {0}")]
    Transport(String),

    #[error("Script injection failed: {0}")]
    Injection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
