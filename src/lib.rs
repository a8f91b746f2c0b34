//! PCAN-Basic bindings for Rust
//!
//! This crate loads the PEAK-System PCAN-Basic driver library at runtime and
//! exposes its channels through a safe API.
//!
//! # Features
//!
//! - Classic CAN and CAN FD channels
//! - Blocking reads with timeout, woken by the driver's receive event
//! - Draining the receive queue without losing frames on failure
//! - Reception filters, channel parameters and trace files
//! - Channel lookup and enumeration of attached USB hardware
//!
//! # Example
//!
//! ```no_run
//! use pcan_basic::{CanMessage, PcanApi, PcanBus, PCAN_BAUD_500K, PCAN_USBBUS1};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> pcan_basic::Result<()> {
//!     // Load the driver library
//!     let api = Arc::new(PcanApi::open()?);
//!
//!     // Initialize the first USB channel at 500 kbit/s
//!     let mut bus = PcanBus::initialize_basic(api, PCAN_USBBUS1, PCAN_BAUD_500K)?;
//!
//!     // Send a frame
//!     let data = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
//!     bus.write(&CanMessage::standard(0x7FF, &data)?)?;
//!
//!     // Read frames
//!     loop {
//!         match bus.read_timeout(Some(Duration::from_millis(100)))? {
//!             Some(rx) => println!("RX  {} @ {}", rx.message, rx.timestamp),
//!             None => continue,
//!         }
//!     }
//! }
//! ```
//!
//! # Library location
//!
//! [`PcanApi::new`] loads `PCANBasic.dll` on Windows, `libpcanbasic.so` on
//! Linux and `libPCBUSB.dylib` on macOS. Set `PCAN_BASIC_LIBRARY` to load a
//! different file.

pub mod bus;
pub mod channels;
pub mod constants;
pub mod driver;
pub mod error;
pub mod frame;
pub mod library;
pub mod status;
pub mod structures;
pub mod wait;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use constants::{
    baudrate_from_bps,
    channel_from_name,
    // CAN ID masks
    CAN_EFF_MASK,
    CAN_SFF_MASK,
    // Baud rates
    PCAN_BAUD_100K,
    PCAN_BAUD_125K,
    PCAN_BAUD_1M,
    PCAN_BAUD_250K,
    PCAN_BAUD_500K,
    PCAN_BAUD_800K,
    // Message types
    PCAN_MESSAGE_BRS,
    PCAN_MESSAGE_ECHO,
    PCAN_MESSAGE_ERRFRAME,
    PCAN_MESSAGE_ESI,
    PCAN_MESSAGE_EXTENDED,
    PCAN_MESSAGE_FD,
    PCAN_MESSAGE_RTR,
    PCAN_MESSAGE_STANDARD,
    PCAN_MESSAGE_STATUS,
    // Channels
    PCAN_NONEBUS,
    PCAN_PCIBUS1,
    PCAN_USBBUS1,
    PCAN_USBBUS2,
    PCAN_USB_CHANNELS,
};

pub use bus::{BusMode, PcanBus};
pub use driver::Driver;
pub use error::{PcanError, Result};
pub use frame::{CanFdMessage, CanMessage, Message, Payload, Received, Timestamp};
pub use library::PcanApi;
pub use status::Status;
pub use structures::{BitrateFd, BusConfig, ChannelCondition, FilterMode, LookupQuery, TraceConfig};
pub use wait::{ReceiveWait, SleepWait, WaitOutcome};
