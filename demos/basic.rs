//! PCAN-Basic Example
//!
//! This example demonstrates basic usage of the library:
//! - Loading the driver and listing attached channels
//! - Initializing a channel
//! - Sending and receiving CAN frames

use std::sync::Arc;
use std::time::{Duration, Instant};

use pcan_basic::channels::{attached_channels, error_text};
use pcan_basic::constants::{PCAN_HARDWARE_NAME, PCAN_LANGUAGE_ENGLISH};
use pcan_basic::{CanMessage, PcanApi, PcanBus, PCAN_BAUD_500K, PCAN_USBBUS1};

fn main() {
    // Initialize logging
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> pcan_basic::Result<()> {
    let api = Arc::new(PcanApi::open()?);
    println!("Loaded {}", api.path().display());

    let channels = attached_channels(&*api)?;
    if !channels.contains(&PCAN_USBBUS1) {
        println!("PCAN_USBBUS1 is not attached (found {:X?})", channels);
        return Ok(());
    }

    let mut bus = PcanBus::initialize_basic(Arc::clone(&api), PCAN_USBBUS1, PCAN_BAUD_500K)?;
    println!("Channel started: {}", bus.get_string(PCAN_HARDWARE_NAME)?);
    println!("Event driven reads: {}", bus.is_event_driven());

    bus.set_allow_echo_frames(true)?;

    let data: [u8; 8] = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
    let frames = [
        // Standard frame format with data
        CanMessage::standard(0x7FF, &data)?,
        // Standard frame format without data
        CanMessage::standard(0x7FF, &[])?,
        // Extended frame format with data
        CanMessage::extended(0x1234_5678, &data)?,
        // Remote transmission request (extended)
        CanMessage::remote(0x1234_5678, 8, true)?,
    ];

    for frame in &frames {
        bus.write(frame)?;
        println!("TX  {}", frame);
    }

    // Whatever is already queued
    for rx in bus.read_all(0)? {
        println!("RX  {} @ {}", rx.message, rx.timestamp);
    }

    println!("\nListening for 5 seconds...\n");
    let end = Instant::now() + Duration::from_secs(5);
    while Instant::now() < end {
        match bus.read_timeout(Some(Duration::from_millis(500))) {
            Ok(Some(rx)) => println!("RX  {} @ {}", rx.message, rx.timestamp),
            Ok(None) => {}
            Err(e) => {
                match e.status() {
                    Some(status) => eprintln!(
                        "Read error: {}",
                        error_text(&*api, status, PCAN_LANGUAGE_ENGLISH)?
                    ),
                    None => eprintln!("Read error: {}", e),
                }
                break;
            }
        }
    }

    println!("Bus status: {}", bus.status()?);
    bus.uninitialize()
}
