//! PCAN-Basic constants
//!
//! This module mirrors the defines of `PCANBasic.h`: channel handles, baud rate
//! codes, parameter identifiers and values, message type flags and trace
//! configuration flags. Status codes live on [`crate::Status`].

// ============================================================================
// Channel Handles
// ============================================================================

/// Undefined/default value for a PCAN bus
pub const PCAN_NONEBUS: u16 = 0x00;

/// PCAN-ISA interface, channel 1
pub const PCAN_ISABUS1: u16 = 0x21;
/// PCAN-ISA interface, channel 2
pub const PCAN_ISABUS2: u16 = 0x22;
/// PCAN-ISA interface, channel 3
pub const PCAN_ISABUS3: u16 = 0x23;
/// PCAN-ISA interface, channel 4
pub const PCAN_ISABUS4: u16 = 0x24;
/// PCAN-ISA interface, channel 5
pub const PCAN_ISABUS5: u16 = 0x25;
/// PCAN-ISA interface, channel 6
pub const PCAN_ISABUS6: u16 = 0x26;
/// PCAN-ISA interface, channel 7
pub const PCAN_ISABUS7: u16 = 0x27;
/// PCAN-ISA interface, channel 8
pub const PCAN_ISABUS8: u16 = 0x28;

/// PCAN-Dongle/LPT interface, channel 1
pub const PCAN_DNGBUS1: u16 = 0x31;

/// PCAN-PCI interface, channel 1
pub const PCAN_PCIBUS1: u16 = 0x41;
/// PCAN-PCI interface, channel 2
pub const PCAN_PCIBUS2: u16 = 0x42;
/// PCAN-PCI interface, channel 3
pub const PCAN_PCIBUS3: u16 = 0x43;
/// PCAN-PCI interface, channel 4
pub const PCAN_PCIBUS4: u16 = 0x44;
/// PCAN-PCI interface, channel 5
pub const PCAN_PCIBUS5: u16 = 0x45;
/// PCAN-PCI interface, channel 6
pub const PCAN_PCIBUS6: u16 = 0x46;
/// PCAN-PCI interface, channel 7
pub const PCAN_PCIBUS7: u16 = 0x47;
/// PCAN-PCI interface, channel 8
pub const PCAN_PCIBUS8: u16 = 0x48;
/// PCAN-PCI interface, channel 9
pub const PCAN_PCIBUS9: u16 = 0x409;
/// PCAN-PCI interface, channel 10
pub const PCAN_PCIBUS10: u16 = 0x40A;
/// PCAN-PCI interface, channel 11
pub const PCAN_PCIBUS11: u16 = 0x40B;
/// PCAN-PCI interface, channel 12
pub const PCAN_PCIBUS12: u16 = 0x40C;
/// PCAN-PCI interface, channel 13
pub const PCAN_PCIBUS13: u16 = 0x40D;
/// PCAN-PCI interface, channel 14
pub const PCAN_PCIBUS14: u16 = 0x40E;
/// PCAN-PCI interface, channel 15
pub const PCAN_PCIBUS15: u16 = 0x40F;
/// PCAN-PCI interface, channel 16
pub const PCAN_PCIBUS16: u16 = 0x410;

/// PCAN-USB interface, channel 1
pub const PCAN_USBBUS1: u16 = 0x51;
/// PCAN-USB interface, channel 2
pub const PCAN_USBBUS2: u16 = 0x52;
/// PCAN-USB interface, channel 3
pub const PCAN_USBBUS3: u16 = 0x53;
/// PCAN-USB interface, channel 4
pub const PCAN_USBBUS4: u16 = 0x54;
/// PCAN-USB interface, channel 5
pub const PCAN_USBBUS5: u16 = 0x55;
/// PCAN-USB interface, channel 6
pub const PCAN_USBBUS6: u16 = 0x56;
/// PCAN-USB interface, channel 7
pub const PCAN_USBBUS7: u16 = 0x57;
/// PCAN-USB interface, channel 8
pub const PCAN_USBBUS8: u16 = 0x58;
/// PCAN-USB interface, channel 9
pub const PCAN_USBBUS9: u16 = 0x509;
/// PCAN-USB interface, channel 10
pub const PCAN_USBBUS10: u16 = 0x50A;
/// PCAN-USB interface, channel 11
pub const PCAN_USBBUS11: u16 = 0x50B;
/// PCAN-USB interface, channel 12
pub const PCAN_USBBUS12: u16 = 0x50C;
/// PCAN-USB interface, channel 13
pub const PCAN_USBBUS13: u16 = 0x50D;
/// PCAN-USB interface, channel 14
pub const PCAN_USBBUS14: u16 = 0x50E;
/// PCAN-USB interface, channel 15
pub const PCAN_USBBUS15: u16 = 0x50F;
/// PCAN-USB interface, channel 16
pub const PCAN_USBBUS16: u16 = 0x510;

/// PCAN-PC Card interface, channel 1
pub const PCAN_PCCBUS1: u16 = 0x61;
/// PCAN-PC Card interface, channel 2
pub const PCAN_PCCBUS2: u16 = 0x62;

/// PCAN-LAN interface, channel 1
pub const PCAN_LANBUS1: u16 = 0x801;
/// PCAN-LAN interface, channel 2
pub const PCAN_LANBUS2: u16 = 0x802;
/// PCAN-LAN interface, channel 3
pub const PCAN_LANBUS3: u16 = 0x803;
/// PCAN-LAN interface, channel 4
pub const PCAN_LANBUS4: u16 = 0x804;

/// All PCAN-USB channel handles in channel order
pub static PCAN_USB_CHANNELS: [u16; 16] = [
    PCAN_USBBUS1,
    PCAN_USBBUS2,
    PCAN_USBBUS3,
    PCAN_USBBUS4,
    PCAN_USBBUS5,
    PCAN_USBBUS6,
    PCAN_USBBUS7,
    PCAN_USBBUS8,
    PCAN_USBBUS9,
    PCAN_USBBUS10,
    PCAN_USBBUS11,
    PCAN_USBBUS12,
    PCAN_USBBUS13,
    PCAN_USBBUS14,
    PCAN_USBBUS15,
    PCAN_USBBUS16,
];

// ============================================================================
// Baud Rate Codes (BTR0/BTR1 register values)
// ============================================================================

/// 1 MBit/s
pub const PCAN_BAUD_1M: u16 = 0x0014;
/// 800 kBit/s
pub const PCAN_BAUD_800K: u16 = 0x0016;
/// 500 kBit/s
pub const PCAN_BAUD_500K: u16 = 0x001C;
/// 250 kBit/s
pub const PCAN_BAUD_250K: u16 = 0x011C;
/// 125 kBit/s
pub const PCAN_BAUD_125K: u16 = 0x031C;
/// 100 kBit/s
pub const PCAN_BAUD_100K: u16 = 0x432F;
/// 95,238 kBit/s
pub const PCAN_BAUD_95K: u16 = 0xC34E;
/// 83,333 kBit/s
pub const PCAN_BAUD_83K: u16 = 0x852B;
/// 50 kBit/s
pub const PCAN_BAUD_50K: u16 = 0x472F;
/// 47,619 kBit/s
pub const PCAN_BAUD_47K: u16 = 0x1414;
/// 33,333 kBit/s
pub const PCAN_BAUD_33K: u16 = 0x8B2F;
/// 20 kBit/s
pub const PCAN_BAUD_20K: u16 = 0x532F;
/// 10 kBit/s
pub const PCAN_BAUD_10K: u16 = 0x672F;
/// 5 kBit/s
pub const PCAN_BAUD_5K: u16 = 0x7F7F;

// ============================================================================
// Non-PnP Hardware Types
// ============================================================================

/// PCAN-ISA 82C200
pub const PCAN_TYPE_ISA: u8 = 0x01;
/// PCAN-ISA SJA1000
pub const PCAN_TYPE_ISA_SJA: u8 = 0x09;
/// PHYTEC ISA
pub const PCAN_TYPE_ISA_PHYTEC: u8 = 0x04;
/// PCAN-Dongle 82C200
pub const PCAN_TYPE_DNG: u8 = 0x02;
/// PCAN-Dongle EPP 82C200
pub const PCAN_TYPE_DNG_EPP: u8 = 0x03;
/// PCAN-Dongle SJA1000
pub const PCAN_TYPE_DNG_SJA: u8 = 0x05;
/// PCAN-Dongle EPP SJA1000
pub const PCAN_TYPE_DNG_SJA_EPP: u8 = 0x06;

/// Hardware type used for plug and play channels
pub const PCAN_DEFAULT_HW_TYPE: u8 = 0;
/// I/O port used for plug and play channels
pub const PCAN_DEFAULT_IO_PORT: u32 = 0;
/// Interrupt used for plug and play channels
pub const PCAN_DEFAULT_INTERRUPT: u16 = 0;

// ============================================================================
// Parameters (CAN_GetValue / CAN_SetValue)
// ============================================================================

/// Device identifier parameter
pub const PCAN_DEVICE_ID: u8 = 0x01;
/// 5-Volt power parameter
pub const PCAN_5VOLTS_POWER: u8 = 0x02;
/// PCAN receive event handler parameter
pub const PCAN_RECEIVE_EVENT: u8 = 0x03;
/// PCAN message filter parameter
pub const PCAN_MESSAGE_FILTER: u8 = 0x04;
/// PCAN-Basic API version parameter
pub const PCAN_API_VERSION: u8 = 0x05;
/// PCAN device channel version parameter
pub const PCAN_CHANNEL_VERSION: u8 = 0x06;
/// PCAN reset-on-busoff parameter
pub const PCAN_BUSOFF_AUTORESET: u8 = 0x07;
/// Listen-only parameter
pub const PCAN_LISTEN_ONLY: u8 = 0x08;
/// Directory path for log files
pub const PCAN_LOG_LOCATION: u8 = 0x09;
/// Debug-log activation status
pub const PCAN_LOG_STATUS: u8 = 0x0A;
/// Configuration of the debugged information
pub const PCAN_LOG_CONFIGURE: u8 = 0x0B;
/// Custom insertion of text into the log file
pub const PCAN_LOG_TEXT: u8 = 0x0C;
/// Availability status of a PCAN channel
pub const PCAN_CHANNEL_CONDITION: u8 = 0x0D;
/// PCAN hardware name parameter
pub const PCAN_HARDWARE_NAME: u8 = 0x0E;
/// Message reception status of a PCAN channel
pub const PCAN_RECEIVE_STATUS: u8 = 0x0F;
/// CAN controller number of a PCAN channel
pub const PCAN_CONTROLLER_NUMBER: u8 = 0x10;
/// Directory path for PCAN trace files
pub const PCAN_TRACE_LOCATION: u8 = 0x11;
/// CAN tracing activation status
pub const PCAN_TRACE_STATUS: u8 = 0x12;
/// Configuration of the maximum file size of a CAN trace
pub const PCAN_TRACE_SIZE: u8 = 0x13;
/// Configuration of the trace file storing mode
pub const PCAN_TRACE_CONFIGURE: u8 = 0x14;
/// Physical identification of a USB based PCAN channel by blinking its LED
pub const PCAN_CHANNEL_IDENTIFYING: u8 = 0x15;
/// Capabilities of a PCAN device
pub const PCAN_CHANNEL_FEATURES: u8 = 0x16;
/// Use of an existing bit rate when connecting to an initialized channel
pub const PCAN_BITRATE_ADAPTING: u8 = 0x17;
/// Configured bit rate as BTR0BTR1 value
pub const PCAN_BITRATE_INFO: u8 = 0x18;
/// Configured bit rate as TPCANBitrateFD string
pub const PCAN_BITRATE_INFO_FD: u8 = 0x19;
/// Configured nominal CAN bus speed as bits per second
pub const PCAN_BUSSPEED_NOMINAL: u8 = 0x1A;
/// Configured CAN data speed as bits per second
pub const PCAN_BUSSPEED_DATA: u8 = 0x1B;
/// Remote address of a LAN channel as string in IPv4 format
pub const PCAN_IP_ADDRESS: u8 = 0x1C;
/// Status of the Virtual PCAN-Gateway service
pub const PCAN_LAN_SERVICE_STATUS: u8 = 0x1D;
/// Status messages reception status within a PCAN channel
pub const PCAN_ALLOW_STATUS_FRAMES: u8 = 0x1E;
/// RTR messages reception status within a PCAN channel
pub const PCAN_ALLOW_RTR_FRAMES: u8 = 0x1F;
/// Error messages reception status within a PCAN channel
pub const PCAN_ALLOW_ERROR_FRAMES: u8 = 0x20;
/// Delay, in microseconds, between sending frames
pub const PCAN_INTERFRAME_DELAY: u8 = 0x21;
/// Filter over code and mask patterns for 11-bit messages
pub const PCAN_ACCEPTANCE_FILTER_11BIT: u8 = 0x22;
/// Filter over code and mask patterns for 29-bit messages
pub const PCAN_ACCEPTANCE_FILTER_29BIT: u8 = 0x23;
/// Firmware version of a PCAN channel
pub const PCAN_FIRMWARE_VERSION: u8 = 0x29;
/// Amount of PCAN channels attached to a system
pub const PCAN_ATTACHED_CHANNELS_COUNT: u8 = 0x2A;
/// Information about PCAN channels attached to a system
pub const PCAN_ATTACHED_CHANNELS: u8 = 0x2B;
/// Echo messages reception status within a PCAN channel
pub const PCAN_ALLOW_ECHO_FRAMES: u8 = 0x2C;
/// Part number of a PCAN device
pub const PCAN_DEVICE_PART_NUMBER: u8 = 0x2D;

// ============================================================================
// Parameter Values
// ============================================================================

/// The PCAN parameter is not set (inactive)
pub const PCAN_PARAMETER_OFF: u32 = 0x00;
/// The PCAN parameter is set (active)
pub const PCAN_PARAMETER_ON: u32 = 0x01;
/// The PCAN filter is closed. No messages will be received
pub const PCAN_FILTER_CLOSE: u32 = 0x00;
/// The PCAN filter is fully opened. All messages will be received
pub const PCAN_FILTER_OPEN: u32 = 0x01;
/// The PCAN filter is custom configured
pub const PCAN_FILTER_CUSTOM: u32 = 0x02;
/// The PCAN channel handle is illegal, or its associated hardware is not available
pub const PCAN_CHANNEL_UNAVAILABLE: u32 = 0x00;
/// The PCAN channel handle is available to be connected
pub const PCAN_CHANNEL_AVAILABLE: u32 = 0x01;
/// The PCAN channel handle is valid, and is already being used
pub const PCAN_CHANNEL_OCCUPIED: u32 = 0x02;
/// The PCAN channel handle is already being used by a PCAN-View application
pub const PCAN_CHANNEL_PCANVIEW: u32 = PCAN_CHANNEL_AVAILABLE | PCAN_CHANNEL_OCCUPIED;

// ============================================================================
// Trace Configuration Flags
// ============================================================================

/// A single file is written until it size reaches PCAN_TRACE_SIZE
pub const TRACE_FILE_SINGLE: u32 = 0x00;
/// Traced data is distributed in several files with size PCAN_TRACE_SIZE
pub const TRACE_FILE_SEGMENTED: u32 = 0x01;
/// Includes the date into the name of the trace file
pub const TRACE_FILE_DATE: u32 = 0x02;
/// Includes the start time into the name of the trace file
pub const TRACE_FILE_TIME: u32 = 0x04;
/// Causes the overwriting of available traces (same name)
pub const TRACE_FILE_OVERWRITE: u32 = 0x80;

/// Largest trace file size, in megabytes, accepted by the driver
pub const MAX_TRACE_FILE_SIZE_MB: u32 = 100;

// ============================================================================
// Message Type Flags
// ============================================================================

/// The PCAN message is a CAN standard frame (11-bit identifier)
pub const PCAN_MESSAGE_STANDARD: u8 = 0x00;
/// The PCAN message is a CAN remote-transfer-request frame
pub const PCAN_MESSAGE_RTR: u8 = 0x01;
/// The PCAN message is a CAN extended frame (29-bit identifier)
pub const PCAN_MESSAGE_EXTENDED: u8 = 0x02;
/// The PCAN message represents a FD frame in terms of CiA specs
pub const PCAN_MESSAGE_FD: u8 = 0x04;
/// The PCAN message represents a FD bit rate switch (CAN data at a higher bit rate)
pub const PCAN_MESSAGE_BRS: u8 = 0x08;
/// The PCAN message represents a FD error state indicator (CAN FD transmitter was error active)
pub const PCAN_MESSAGE_ESI: u8 = 0x10;
/// The PCAN message represents an echo CAN frame
pub const PCAN_MESSAGE_ECHO: u8 = 0x20;
/// The PCAN message represents an error frame
pub const PCAN_MESSAGE_ERRFRAME: u8 = 0x40;
/// The PCAN message represents a PCAN status message
pub const PCAN_MESSAGE_STATUS: u8 = 0x80;

/// Filter mode for 11-bit identifiers
pub const PCAN_MODE_STANDARD: u8 = PCAN_MESSAGE_STANDARD;
/// Filter mode for 29-bit identifiers
pub const PCAN_MODE_EXTENDED: u8 = PCAN_MESSAGE_EXTENDED;

// ============================================================================
// CAN ID Masks
// ============================================================================

/// Standard frame format mask (11-bit ID)
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
/// Extended frame format mask (29-bit ID)
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

// ============================================================================
// CAN Payload Definitions
// ============================================================================

/// Maximum DLC for classic CAN
pub const CAN_MAX_DLC: u8 = 8;
/// Maximum data length for classic CAN
pub const CAN_MAX_DLEN: usize = 8;

/// Maximum DLC for CAN FD
pub const CANFD_MAX_DLC: u8 = 15;
/// Maximum data length for CAN FD
pub const CANFD_MAX_DLEN: usize = 64;

/// DLC to data length conversion table for CAN FD
pub const CANFD_DLC_TO_LEN: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

// ============================================================================
// Buffers, Lookup Keys, Languages
// ============================================================================

/// Size of the string buffers exchanged with the driver (error texts, paths)
pub const MAX_LENGTH_STRING_BUFFER: usize = 256;
/// Maximum length of a hardware name, NUL included
pub const MAX_LENGTH_HARDWARE_NAME: usize = 33;

/// Lookup parameter key for the device type
pub const LOOKUP_DEVICE_TYPE: &str = "devicetype";
/// Lookup parameter key for the device identifier
pub const LOOKUP_DEVICE_ID: &str = "deviceid";
/// Lookup parameter key for the controller number
pub const LOOKUP_CONTROLLER_NUMBER: &str = "controllernumber";
/// Lookup parameter key for the IP address of a LAN channel
pub const LOOKUP_IP_ADDRESS: &str = "ipaddress";

/// System default language for error texts
pub const PCAN_LANGUAGE_NEUTRAL: u16 = 0x00;
/// German
pub const PCAN_LANGUAGE_GERMAN: u16 = 0x07;
/// English
pub const PCAN_LANGUAGE_ENGLISH: u16 = 0x09;
/// Spanish
pub const PCAN_LANGUAGE_SPANISH: u16 = 0x0A;
/// French
pub const PCAN_LANGUAGE_FRENCH: u16 = 0x0C;
/// Italian
pub const PCAN_LANGUAGE_ITALIAN: u16 = 0x10;

/// All PCAN-PCI channel handles in channel order
pub static PCAN_PCI_CHANNELS: [u16; 16] = [
    PCAN_PCIBUS1,
    PCAN_PCIBUS2,
    PCAN_PCIBUS3,
    PCAN_PCIBUS4,
    PCAN_PCIBUS5,
    PCAN_PCIBUS6,
    PCAN_PCIBUS7,
    PCAN_PCIBUS8,
    PCAN_PCIBUS9,
    PCAN_PCIBUS10,
    PCAN_PCIBUS11,
    PCAN_PCIBUS12,
    PCAN_PCIBUS13,
    PCAN_PCIBUS14,
    PCAN_PCIBUS15,
    PCAN_PCIBUS16,
];

static PCAN_ISA_CHANNELS: [u16; 8] = [
    PCAN_ISABUS1,
    PCAN_ISABUS2,
    PCAN_ISABUS3,
    PCAN_ISABUS4,
    PCAN_ISABUS5,
    PCAN_ISABUS6,
    PCAN_ISABUS7,
    PCAN_ISABUS8,
];

static PCAN_LAN_CHANNELS: [u16; 4] = [PCAN_LANBUS1, PCAN_LANBUS2, PCAN_LANBUS3, PCAN_LANBUS4];
static PCAN_PCC_CHANNELS: [u16; 2] = [PCAN_PCCBUS1, PCAN_PCCBUS2];
static PCAN_DNG_CHANNELS: [u16; 1] = [PCAN_DNGBUS1];

/// Resolve a channel name such as `PCAN_USBBUS1` to its handle
pub fn channel_from_name(name: &str) -> Option<u16> {
    let upper = name.trim().to_ascii_uppercase();
    let name = upper.strip_prefix("PCAN_").unwrap_or(upper.as_str());

    if name == "NONEBUS" {
        return Some(PCAN_NONEBUS);
    }

    let banks: [(&str, &[u16]); 6] = [
        ("USBBUS", &PCAN_USB_CHANNELS),
        ("PCIBUS", &PCAN_PCI_CHANNELS),
        ("ISABUS", &PCAN_ISA_CHANNELS),
        ("LANBUS", &PCAN_LAN_CHANNELS),
        ("PCCBUS", &PCAN_PCC_CHANNELS),
        ("DNGBUS", &PCAN_DNG_CHANNELS),
    ];

    banks.iter().find_map(|(prefix, bank)| {
        let number: usize = name.strip_prefix(*prefix)?.parse().ok()?;
        number.checked_sub(1).and_then(|i| bank.get(i)).copied()
    })
}

/// Map a bit rate in bits per second to its BTR0BTR1 code
pub fn baudrate_from_bps(bps: u32) -> Option<u16> {
    match bps {
        1_000_000 => Some(PCAN_BAUD_1M),
        800_000 => Some(PCAN_BAUD_800K),
        500_000 => Some(PCAN_BAUD_500K),
        250_000 => Some(PCAN_BAUD_250K),
        125_000 => Some(PCAN_BAUD_125K),
        100_000 => Some(PCAN_BAUD_100K),
        95_000 | 95_238 => Some(PCAN_BAUD_95K),
        83_000 | 83_333 => Some(PCAN_BAUD_83K),
        50_000 => Some(PCAN_BAUD_50K),
        47_000 | 47_619 => Some(PCAN_BAUD_47K),
        33_000 | 33_333 => Some(PCAN_BAUD_33K),
        20_000 => Some(PCAN_BAUD_20K),
        10_000 => Some(PCAN_BAUD_10K),
        5_000 => Some(PCAN_BAUD_5K),
        _ => None,
    }
}

/// Get human-readable name for a channel condition value
pub fn channel_condition_name(condition: u32) -> &'static str {
    match condition {
        PCAN_CHANNEL_UNAVAILABLE => "UNAVAILABLE",
        PCAN_CHANNEL_AVAILABLE => "AVAILABLE",
        PCAN_CHANNEL_OCCUPIED => "OCCUPIED",
        PCAN_CHANNEL_PCANVIEW => "PCANVIEW",
        _ => "UNKNOWN",
    }
}
