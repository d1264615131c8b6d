use thiserror::Error;

/// Usage and configuration errors surfaced synchronously to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewerError {
    #[error("Protocol '{0}' is already attached to a session")]
    AlreadyAttached(String),

    #[error("Protocol '{0}' is not attached to any session")]
    NotAttached(String),

    #[error("A window cannot be set as its own owner")]
    SelfOwnership,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Presentation host is not running")]
    HostUnavailable,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures reported by a decoder. These never leave the decode worker.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Truncated packet: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Packet too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Non-UTF8 content")]
    NonUtf8,

    #[error("Malformed packet: {0}")]
    Malformed(String),

    #[error("Decoder panic: {0}")]
    Panic(String),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
