//! Errors for the I/O device core (spec.md §4.1): one enum per
//! subsystem, matching the rest of this crate's error modules.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IodevError {
    #[error("device is already open")]
    AlreadyOpen,

    #[error("device is not open")]
    NotOpen,

    #[error("backend failed to open device: {0}")]
    BackendOpenFailed(String),

    #[error("no supported format matches the request")]
    NoMatchingFormat,

    #[error("node {0} not found on this device")]
    NodeNotFound(u32),

    #[error("device has no active node")]
    NoActiveNode,

    #[error("concurrent get_buffer call rejected")]
    BufferAlreadyCheckedOut,

    #[error("put_buffer({requested}) exceeds frames handed out by get_buffer ({available})")]
    PutBufferOverrun { requested: u32, available: u32 },

    #[error("stream {0} is not attached to this device")]
    StreamNotAttached(u32),
}

pub type IodevResult<T> = Result<T, IodevError>;
