//! Send a single CAN frame and wait for the first reply
//!
//! ```text
//! cargo run --example send_frame -- --channel PCAN_USBBUS1 --bitrate 250000 \
//!     --id 123 --data 1122334455667788
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pcan_basic::{baudrate_from_bps, channel_from_name, CanMessage, PcanApi, PcanBus};

#[derive(Parser, Debug)]
#[command(name = "send_frame", about = "Send one frame on a PCAN channel")]
struct Cli {
    /// Channel name, for example PCAN_USBBUS1.
    #[arg(long, default_value = "PCAN_USBBUS1", value_parser = parse_channel)]
    channel: u16,

    /// Bit rate in bits per second.
    #[arg(long, default_value_t = 500_000)]
    bitrate: u32,

    /// Identifier in hex.
    #[arg(long, value_parser = parse_hex_id)]
    id: u32,

    /// Payload as hex bytes, up to 8.
    #[arg(long, default_value = "")]
    data: String,

    /// Send with a 29-bit identifier.
    #[arg(long)]
    extended: bool,

    /// Milliseconds to wait for a reply, negative to wait forever.
    #[arg(long, default_value_t = 1000, allow_negative_numbers = true)]
    timeout_ms: i64,
}

fn parse_channel(name: &str) -> Result<u16, String> {
    channel_from_name(name).ok_or_else(|| format!("unknown channel {:?}", name))
}

fn parse_hex_id(value: &str) -> Result<u32, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

fn parse_hex_data(value: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<char> = value.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let byte: String = pair.iter().collect();
            u8::from_str_radix(&byte, 16).map_err(|e| e.to_string())
        })
        .collect()
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> pcan_basic::Result<()> {
    let Some(baudrate) = baudrate_from_bps(cli.bitrate) else {
        eprintln!("Unsupported bit rate {}", cli.bitrate);
        std::process::exit(2);
    };

    let data = match parse_hex_data(&cli.data) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Invalid data {:?}: {}", cli.data, e);
            std::process::exit(2);
        }
    };

    let message = if cli.extended {
        CanMessage::extended(cli.id, &data)?
    } else {
        CanMessage::standard(cli.id, &data)?
    };

    let api = Arc::new(PcanApi::open()?);
    let mut bus = PcanBus::initialize_basic(api, cli.channel, baudrate)?;

    bus.write(&message)?;
    println!("TX  {}", message);

    match bus.read_timeout_ms(cli.timeout_ms)? {
        Some(rx) => println!("RX  {} @ {}", rx.message, rx.timestamp),
        None => println!("No reply within {} ms", cli.timeout_ms),
    }
    Ok(())
}
