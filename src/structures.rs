//! PCAN-Basic structures
//!
//! This module contains the `#[repr(C)]` mirrors of the driver's message and
//! timestamp records, and the configuration values passed to channel
//! initialization, tracing and channel lookup.

use std::ffi::CString;
use std::path::PathBuf;

use crate::constants::{
    channel_condition_name, CANFD_MAX_DLEN, CAN_MAX_DLEN, LOOKUP_CONTROLLER_NUMBER,
    LOOKUP_DEVICE_ID, LOOKUP_DEVICE_TYPE, LOOKUP_IP_ADDRESS, MAX_LENGTH_STRING_BUFFER,
    MAX_TRACE_FILE_SIZE_MB, PCAN_BAUD_500K, PCAN_CHANNEL_AVAILABLE, PCAN_CHANNEL_OCCUPIED,
    PCAN_CHANNEL_PCANVIEW, PCAN_CHANNEL_UNAVAILABLE, PCAN_DEFAULT_HW_TYPE,
    PCAN_DEFAULT_INTERRUPT, PCAN_DEFAULT_IO_PORT, PCAN_MESSAGE_FD, PCAN_MODE_EXTENDED,
    PCAN_MODE_STANDARD, TRACE_FILE_DATE, TRACE_FILE_OVERWRITE, TRACE_FILE_SEGMENTED,
    TRACE_FILE_SINGLE, TRACE_FILE_TIME,
};
use crate::error::{PcanError, Result};
use crate::frame::{dlc_to_len, CanFdMessage, CanMessage, Message, Payload, Timestamp};

/// Classic CAN message as laid out by the driver (`TPCANMsg`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// 11/29-bit message identifier
    pub id: u32,
    /// Type of the message
    pub msg_type: u8,
    /// Data length code of the message (0..8)
    pub len: u8,
    /// Data of the message
    pub data: [u8; CAN_MAX_DLEN],
}

/// CAN FD message as laid out by the driver (`TPCANMsgFD`)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessageFd {
    /// 11/29-bit message identifier
    pub id: u32,
    /// Type of the message
    pub msg_type: u8,
    /// Data length code of the message (0..15)
    pub dlc: u8,
    /// Data of the message
    pub data: [u8; CANFD_MAX_DLEN],
}

impl Default for RawMessageFd {
    fn default() -> Self {
        Self {
            id: 0,
            msg_type: 0,
            dlc: 0,
            data: [0u8; CANFD_MAX_DLEN],
        }
    }
}

/// Receive timestamp as laid out by the driver (`TPCANTimestamp`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTimestamp {
    /// Base-value: milliseconds, 0 to 2^32-1
    pub millis: u32,
    /// Roll-arounds of millis
    pub millis_overflow: u16,
    /// Microseconds, 0 to 999
    pub micros: u16,
}

impl From<RawTimestamp> for Timestamp {
    fn from(raw: RawTimestamp) -> Self {
        Timestamp::new(raw.millis, raw.millis_overflow, raw.micros)
    }
}

impl From<Timestamp> for RawTimestamp {
    fn from(ts: Timestamp) -> Self {
        Self {
            millis: ts.millis,
            millis_overflow: ts.millis_overflow,
            micros: ts.micros,
        }
    }
}

impl From<&CanMessage> for RawMessage {
    fn from(msg: &CanMessage) -> Self {
        Self {
            id: msg.id(),
            msg_type: msg.msg_type(),
            len: msg.len() as u8,
            data: *msg.payload().raw(),
        }
    }
}

impl From<&RawMessage> for CanMessage {
    fn from(raw: &RawMessage) -> Self {
        Message::from_driver(
            raw.id,
            raw.msg_type,
            Payload::from_raw(&raw.data, raw.len as usize),
        )
    }
}

impl From<&CanFdMessage> for RawMessageFd {
    fn from(msg: &CanFdMessage) -> Self {
        Self {
            id: msg.id(),
            msg_type: msg.msg_type(),
            dlc: msg.dlc(),
            data: *msg.payload().raw(),
        }
    }
}

impl From<&RawMessageFd> for CanFdMessage {
    fn from(raw: &RawMessageFd) -> Self {
        let fd = raw.msg_type & PCAN_MESSAGE_FD != 0;
        let len = dlc_to_len(raw.dlc, fd);
        Message::from_driver(raw.id, raw.msg_type, Payload::from_raw(&raw.data, len))
    }
}

/// Classic channel configuration passed to `CAN_Initialize`
///
/// The hardware type, I/O port and interrupt are only used by non plug and
/// play hardware and stay zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// BTR0BTR1 baud rate code (`PCAN_BAUD_*`)
    pub baudrate: u16,
    /// Hardware type (`PCAN_TYPE_*`)
    pub hw_type: u8,
    /// I/O port address
    pub io_port: u32,
    /// Interrupt number
    pub interrupt: u16,
}

impl BusConfig {
    /// Create a plug and play configuration for the given baud rate code
    pub fn new(baudrate: u16) -> Self {
        Self {
            baudrate,
            ..Self::default()
        }
    }

    /// Create a configuration for non plug and play hardware
    pub fn non_pnp(baudrate: u16, hw_type: u8, io_port: u32, interrupt: u16) -> Self {
        Self {
            baudrate,
            hw_type,
            io_port,
            interrupt,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            baudrate: PCAN_BAUD_500K,
            hw_type: PCAN_DEFAULT_HW_TYPE,
            io_port: PCAN_DEFAULT_IO_PORT,
            interrupt: PCAN_DEFAULT_INTERRUPT,
        }
    }
}

impl std::fmt::Display for BusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Baudrate: 0x{:04X}\nHW Type: {}\nIO Port: 0x{:X}\nInterrupt: {}",
            self.baudrate, self.hw_type, self.io_port, self.interrupt
        )
    }
}

/// CAN FD bit timing
///
/// Rendered into the driver's `TPCANBitrateFD` string, for example
/// `f_clock=80000000,nom_brp=10,nom_tseg1=12,nom_tseg2=3,nom_sjw=1,data_brp=4,data_tseg1=7,data_tseg2=2,data_sjw=1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateFd {
    /// Controller clock frequency in Hz
    pub f_clock: u32,
    /// Nominal phase prescaler
    pub nom_brp: u32,
    /// Nominal phase time segment 1
    pub nom_tseg1: u32,
    /// Nominal phase time segment 2
    pub nom_tseg2: u32,
    /// Nominal phase synchronization jump width
    pub nom_sjw: u32,
    /// Data phase prescaler
    pub data_brp: u32,
    /// Data phase time segment 1
    pub data_tseg1: u32,
    /// Data phase time segment 2
    pub data_tseg2: u32,
    /// Data phase synchronization jump width
    pub data_sjw: u32,
}

impl BitrateFd {
    /// Nominal bit rate in bits per second
    ///
    /// `None` if the prescaler is zero or the segments overflow.
    pub fn nominal_bitrate(&self) -> Option<u32> {
        bitrate(self.f_clock, self.nom_brp, self.nom_tseg1, self.nom_tseg2)
    }

    /// Data bit rate in bits per second
    ///
    /// `None` if the prescaler is zero or the segments overflow.
    pub fn data_bitrate(&self) -> Option<u32> {
        bitrate(self.f_clock, self.data_brp, self.data_tseg1, self.data_tseg2)
    }

    /// Encode for `CAN_InitializeFD`
    pub fn to_cstring(&self) -> Result<CString> {
        to_driver_string(&self.to_string())
    }
}

/// Bits per second for one phase: `f_clock / brp / (1 + tseg1 + tseg2)`
fn bitrate(f_clock: u32, brp: u32, tseg1: u32, tseg2: u32) -> Option<u32> {
    let tq = tseg1.checked_add(tseg2)?.checked_add(1)?;
    f_clock.checked_div(brp)?.checked_div(tq)
}

impl Default for BitrateFd {
    /// 500 kbit/s nominal, 2 Mbit/s data on an 80 MHz clock
    fn default() -> Self {
        Self {
            f_clock: 80_000_000,
            nom_brp: 10,
            nom_tseg1: 12,
            nom_tseg2: 3,
            nom_sjw: 1,
            data_brp: 4,
            data_tseg1: 7,
            data_tseg2: 2,
            data_sjw: 1,
        }
    }
}

impl std::fmt::Display for BitrateFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "f_clock={},nom_brp={},nom_tseg1={},nom_tseg2={},nom_sjw={},data_brp={},data_tseg1={},data_tseg2={},data_sjw={}",
            self.f_clock,
            self.nom_brp,
            self.nom_tseg1,
            self.nom_tseg2,
            self.nom_sjw,
            self.data_brp,
            self.data_tseg1,
            self.data_tseg2,
            self.data_sjw
        )
    }
}

/// Identifier width for `CAN_FilterMessages`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// 11-bit identifiers
    Standard,
    /// 29-bit identifiers
    Extended,
}

impl FilterMode {
    /// Driver value
    pub fn as_raw(self) -> u8 {
        match self {
            FilterMode::Standard => PCAN_MODE_STANDARD,
            FilterMode::Extended => PCAN_MODE_EXTENDED,
        }
    }
}

/// Trace file configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Directory for trace files; empty selects the driver default
    pub location: PathBuf,
    /// Maximum file size in MB (at most 100, 0 selects the driver default)
    pub max_file_size_mb: u32,
    /// Split the trace into files of `max_file_size_mb`
    pub segmented: bool,
    /// Include the date in the file name
    pub date: bool,
    /// Include the time in the file name
    pub time: bool,
    /// Overwrite existing files
    pub overwrite: bool,
}

impl TraceConfig {
    /// Create a trace configuration writing to `location`
    ///
    /// A non-zero `max_file_size_mb` splits the trace into segments of that
    /// size; zero writes a single file.
    pub fn new(location: impl Into<PathBuf>, max_file_size_mb: u32) -> Self {
        Self {
            location: location.into(),
            max_file_size_mb,
            segmented: max_file_size_mb > 0,
            ..Self::default()
        }
    }

    /// Combined `TRACE_FILE_*` flags
    pub fn flags(&self) -> u32 {
        let mut flags = if self.segmented {
            TRACE_FILE_SEGMENTED
        } else {
            TRACE_FILE_SINGLE
        };
        if self.date {
            flags |= TRACE_FILE_DATE;
        }
        if self.time {
            flags |= TRACE_FILE_TIME;
        }
        if self.overwrite {
            flags |= TRACE_FILE_OVERWRITE;
        }
        flags
    }

    /// Check the size limit and encode the location for the driver
    ///
    /// The returned buffer always spans [`MAX_LENGTH_STRING_BUFFER`] bytes.
    pub fn validate(&self) -> Result<[u8; MAX_LENGTH_STRING_BUFFER]> {
        if self.max_file_size_mb > MAX_TRACE_FILE_SIZE_MB {
            return Err(PcanError::TraceFileTooLarge {
                size: self.max_file_size_mb,
                max: MAX_TRACE_FILE_SIZE_MB,
            });
        }

        let location = self.location.to_str().ok_or(PcanError::InvalidPath)?;
        let bytes = location.as_bytes();
        if bytes.len() >= MAX_LENGTH_STRING_BUFFER {
            return Err(PcanError::PathTooLong {
                len: bytes.len(),
                max: MAX_LENGTH_STRING_BUFFER - 1,
            });
        }
        if bytes.contains(&0) {
            return Err(PcanError::InteriorNul);
        }

        let mut buffer = [0u8; MAX_LENGTH_STRING_BUFFER];
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(buffer)
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::new(),
            max_file_size_mb: 0,
            segmented: false,
            date: true,
            time: true,
            overwrite: true,
        }
    }
}

/// Search criteria for `CAN_LookUpChannel`
///
/// Unset fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupQuery {
    /// Device type, for example `PCAN_USB`
    pub device_type: Option<String>,
    /// Device identifier
    pub device_id: Option<String>,
    /// Controller number
    pub controller_number: Option<String>,
    /// IP address of a LAN device
    pub ip_address: Option<String>,
}

impl LookupQuery {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device type
    pub fn device_type(mut self, value: impl Into<String>) -> Self {
        self.device_type = Some(value.into());
        self
    }

    /// Set the device identifier
    pub fn device_id(mut self, value: impl Into<String>) -> Self {
        self.device_id = Some(value.into());
        self
    }

    /// Set the controller number
    pub fn controller_number(mut self, value: impl Into<String>) -> Self {
        self.controller_number = Some(value.into());
        self
    }

    /// Set the IP address
    pub fn ip_address(mut self, value: impl Into<String>) -> Self {
        self.ip_address = Some(value.into());
        self
    }

    /// Encode for `CAN_LookUpChannel`
    pub fn to_cstring(&self) -> Result<CString> {
        to_driver_string(&self.to_string())
    }
}

impl std::fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = [
            (LOOKUP_DEVICE_TYPE, &self.device_type),
            (LOOKUP_DEVICE_ID, &self.device_id),
            (LOOKUP_CONTROLLER_NUMBER, &self.controller_number),
            (LOOKUP_IP_ADDRESS, &self.ip_address),
        ];
        let query = fields
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}={}", key, v))
            })
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&query)
    }
}

/// Availability of a channel (`PCAN_CHANNEL_CONDITION`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCondition {
    /// The channel is not available
    Unavailable,
    /// The channel is available
    Available,
    /// The channel is valid and being used
    Occupied,
    /// The channel is connected to PCAN-View
    PcanView,
}

impl ChannelCondition {
    /// Decode a driver value
    ///
    /// Unknown values are reported as [`ChannelCondition::Unavailable`].
    pub fn from_raw(value: u32) -> Self {
        match value {
            PCAN_CHANNEL_AVAILABLE => ChannelCondition::Available,
            PCAN_CHANNEL_OCCUPIED => ChannelCondition::Occupied,
            PCAN_CHANNEL_PCANVIEW => ChannelCondition::PcanView,
            _ => ChannelCondition::Unavailable,
        }
    }

    /// Driver value
    pub fn as_raw(self) -> u32 {
        match self {
            ChannelCondition::Unavailable => PCAN_CHANNEL_UNAVAILABLE,
            ChannelCondition::Available => PCAN_CHANNEL_AVAILABLE,
            ChannelCondition::Occupied => PCAN_CHANNEL_OCCUPIED,
            ChannelCondition::PcanView => PCAN_CHANNEL_PCANVIEW,
        }
    }

    /// Check if some client can or does use the channel
    pub fn is_present(self) -> bool {
        self != ChannelCondition::Unavailable
    }
}

impl std::fmt::Display for ChannelCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(channel_condition_name(self.as_raw()))
    }
}

/// Encode a string argument, bounded by the driver's string buffer
pub(crate) fn to_driver_string(value: &str) -> Result<CString> {
    if value.len() >= MAX_LENGTH_STRING_BUFFER {
        return Err(PcanError::StringTooLong {
            len: value.len(),
            max: MAX_LENGTH_STRING_BUFFER - 1,
        });
    }
    CString::new(value).map_err(|_| PcanError::InteriorNul)
}
