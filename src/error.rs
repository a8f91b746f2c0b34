//! Error types for the PCAN-Basic binding
//!
//! This module defines the error type shared by the loader, the call
//! marshaling layer and the channel facade. Driver status failures carry the
//! native [`Status`]; everything else is detected on this side of the
//! boundary.

use std::io;

use thiserror::Error;

use crate::frame::{CanMessage, Received};
use crate::status::Status;

/// Result type alias for PCAN-Basic operations
pub type Result<T> = std::result::Result<T, PcanError>;

/// Error types for PCAN-Basic operations
#[derive(Error, Debug)]
pub enum PcanError {
    /// The native library could not be opened
    #[error("Failed to load PCAN-Basic library: {0}")]
    Load(#[from] libloading::Error),

    /// The native library lacks a required entry point
    #[error("PCAN-Basic library has no entry point {name}: {source}")]
    MissingEntryPoint {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// A call was made while the library is not loaded
    #[error("PCAN-Basic library is not loaded")]
    NotLoaded,

    /// The channel was already uninitialized
    #[error("Channel is closed")]
    ChannelClosed,

    /// The driver returned a status other than OK
    #[error("PCAN-Basic error: {0}")]
    Status(Status),

    /// Payload does not fit the message
    #[error("Payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// Identifier does not fit its 11-bit or 29-bit range
    #[error("Invalid CAN identifier 0x{id:X} for {} frame", id_kind(.extended))]
    InvalidId { id: u32, extended: bool },

    /// CAN FD flags on a message without CAN FD capacity
    #[error("Message type 0x{0:02X} requires a CAN FD message")]
    FdFlagsOnClassic(u8),

    /// Trace location does not fit the driver's string buffer
    #[error("Path too long: {len} bytes (max {max})")]
    PathTooLong { len: usize, max: usize },

    /// Requested trace file size exceeds the driver limit
    #[error("Trace file size {size} MB exceeds maximum of {max} MB")]
    TraceFileTooLarge { size: u32, max: u32 },

    /// String argument does not fit the driver's string buffer
    #[error("String too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    /// String argument contains a NUL byte
    #[error("String contains an interior NUL byte")]
    InteriorNul,

    /// Path is not valid UTF-8
    #[error("Path is not valid UTF-8")]
    InvalidPath,

    /// Buffer length cannot be expressed to the driver
    #[error("Buffer too large: {0} bytes")]
    BufferTooLarge(usize),

    /// The receive wait primitive failed
    #[error("Receive wait failed: {0}")]
    Wait(#[source] io::Error),

    /// The receive event could not be created
    #[error("Failed to create receive event: {0}")]
    Event(#[source] io::Error),

    /// A drain stopped early; the frames read before the failure are kept
    #[error("Read failed after {} frames: {source}", .received.len())]
    PartialRead {
        received: Vec<Received<CanMessage>>,
        #[source]
        source: Box<PcanError>,
    },
}

fn id_kind(extended: &bool) -> &'static str {
    if *extended {
        "extended"
    } else {
        "standard"
    }
}

impl PcanError {
    /// Driver status carried by this error, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            PcanError::Status(status) => Some(*status),
            PcanError::PartialRead { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Check if this error was raised by local argument validation
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            PcanError::PayloadTooLong { .. }
                | PcanError::InvalidId { .. }
                | PcanError::FdFlagsOnClassic(_)
                | PcanError::PathTooLong { .. }
                | PcanError::TraceFileTooLarge { .. }
                | PcanError::StringTooLong { .. }
                | PcanError::InteriorNul
                | PcanError::InvalidPath
                | PcanError::BufferTooLarge(_)
        )
    }

    /// Check if this error comes from loading or linking the native library
    pub fn is_linkage_error(&self) -> bool {
        matches!(
            self,
            PcanError::Load(_) | PcanError::MissingEntryPoint { .. } | PcanError::NotLoaded
        )
    }

    /// Check if this error reports a CAN bus error condition
    pub fn is_bus_error(&self) -> bool {
        self.status().is_some_and(Status::is_bus_error)
    }
}

impl From<Status> for PcanError {
    fn from(status: Status) -> Self {
        PcanError::Status(status)
    }
}
