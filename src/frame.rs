//! CAN message implementation
//!
//! This module provides [`Message`] for classic CAN and CAN FD frames, the
//! bounded [`Payload`] it carries, and the driver [`Timestamp`] attached to
//! every received frame.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::constants::{
    CANFD_DLC_TO_LEN, CANFD_MAX_DLC, CANFD_MAX_DLEN, CAN_EFF_MASK, CAN_MAX_DLEN, CAN_SFF_MASK,
    PCAN_MESSAGE_BRS, PCAN_MESSAGE_ECHO, PCAN_MESSAGE_ERRFRAME, PCAN_MESSAGE_ESI,
    PCAN_MESSAGE_EXTENDED, PCAN_MESSAGE_FD, PCAN_MESSAGE_RTR, PCAN_MESSAGE_STANDARD,
    PCAN_MESSAGE_STATUS,
};
use crate::error::{PcanError, Result};

/// Convert DLC to data length
pub fn dlc_to_len(dlc: u8, fd: bool) -> usize {
    if fd {
        if (dlc as usize) < CANFD_DLC_TO_LEN.len() {
            CANFD_DLC_TO_LEN[dlc as usize]
        } else {
            CANFD_MAX_DLEN
        }
    } else {
        (dlc as usize).min(CAN_MAX_DLEN)
    }
}

/// Convert data length to DLC
pub fn len_to_dlc(length: usize, fd: bool) -> u8 {
    if fd {
        CANFD_DLC_TO_LEN
            .iter()
            .position(|&dlen| dlen >= length)
            .map_or(CANFD_MAX_DLC, |dlc| dlc as u8)
    } else {
        length.min(CAN_MAX_DLEN) as u8
    }
}

/// Fixed-capacity message payload with an explicit length
///
/// Bytes past `len` are always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Payload<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> Payload<N> {
    /// Create a payload holding a copy of `data`
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.len() > N {
            return Err(PcanError::PayloadTooLong {
                len: data.len(),
                max: N,
            });
        }
        let mut payload = Self::empty();
        payload.data[..data.len()].copy_from_slice(data);
        payload.len = data.len();
        Ok(payload)
    }

    /// Create an empty payload
    pub fn empty() -> Self {
        Self {
            data: [0u8; N],
            len: 0,
        }
    }

    /// Copy at most `len` bytes out of a driver buffer
    pub(crate) fn from_raw(raw: &[u8; N], len: usize) -> Self {
        let len = len.min(N);
        let mut payload = Self::empty();
        payload.data[..len].copy_from_slice(&raw[..len]);
        payload.len = len;
        payload
    }

    /// Grow the logical length with zero padding
    fn pad_to(&mut self, len: usize) {
        self.len = self.len.max(len.min(N));
    }

    /// Meaningful bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Full backing buffer, zero padded
    pub(crate) fn raw(&self) -> &[u8; N] {
        &self.data
    }

    /// Number of meaningful bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the payload has no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for Payload<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> std::ops::Deref for Payload<N> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<const N: usize> std::fmt::Debug for Payload<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Flags only a CAN FD message may carry
const FD_ONLY_FLAGS: u8 = PCAN_MESSAGE_FD | PCAN_MESSAGE_BRS | PCAN_MESSAGE_ESI;

/// CAN message
///
/// `N` is the payload capacity: 8 for classic CAN, 64 for CAN FD. A message
/// is validated on construction and immutable afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message<const N: usize> {
    id: u32,
    msg_type: u8,
    payload: Payload<N>,
}

/// Classic CAN message (8 data bytes)
pub type CanMessage = Message<CAN_MAX_DLEN>;

/// CAN FD message (64 data bytes)
pub type CanFdMessage = Message<CANFD_MAX_DLEN>;

impl<const N: usize> Message<N> {
    /// Create a message
    ///
    /// # Arguments
    /// * `id` - 11-bit or 29-bit identifier, depending on `msg_type`
    /// * `msg_type` - Combination of `PCAN_MESSAGE_*` flags
    /// * `data` - Payload bytes
    ///
    /// Frames flagged `PCAN_MESSAGE_FD` are padded up to the next valid CAN FD
    /// length.
    pub fn new(id: u32, msg_type: u8, data: &[u8]) -> Result<Self> {
        let extended = msg_type & PCAN_MESSAGE_EXTENDED != 0;
        let id_mask = if extended { CAN_EFF_MASK } else { CAN_SFF_MASK };
        if id & !id_mask != 0 {
            return Err(PcanError::InvalidId { id, extended });
        }

        if N <= CAN_MAX_DLEN && msg_type & FD_ONLY_FLAGS != 0 {
            return Err(PcanError::FdFlagsOnClassic(msg_type));
        }

        let fd = Self::supports_fd(msg_type);
        let max = if fd { N } else { N.min(CAN_MAX_DLEN) };
        if data.len() > max {
            return Err(PcanError::PayloadTooLong {
                len: data.len(),
                max,
            });
        }

        let mut payload = Payload::new(data)?;
        if fd {
            payload.pad_to(dlc_to_len(len_to_dlc(data.len(), true), true));
        }

        Ok(Self {
            id,
            msg_type,
            payload,
        })
    }

    /// Create a standard (11-bit) data frame
    pub fn standard(id: u32, data: &[u8]) -> Result<Self> {
        Self::new(id, PCAN_MESSAGE_STANDARD, data)
    }

    /// Create an extended (29-bit) data frame
    pub fn extended(id: u32, data: &[u8]) -> Result<Self> {
        Self::new(id, PCAN_MESSAGE_EXTENDED, data)
    }

    /// Create a remote transmission request for `len` bytes
    pub fn remote(id: u32, len: usize, extended: bool) -> Result<Self> {
        let mut msg_type = PCAN_MESSAGE_RTR;
        if extended {
            msg_type |= PCAN_MESSAGE_EXTENDED;
        }
        let zeros = [0u8; CAN_MAX_DLEN];
        let data = zeros.get(..len).ok_or(PcanError::PayloadTooLong {
            len,
            max: CAN_MAX_DLEN,
        })?;
        Self::new(id, msg_type, data)
    }

    /// Build a message from fields delivered by the driver
    pub(crate) fn from_driver(id: u32, msg_type: u8, payload: Payload<N>) -> Self {
        let id_mask = if msg_type & PCAN_MESSAGE_EXTENDED != 0 {
            CAN_EFF_MASK
        } else {
            CAN_SFF_MASK
        };
        Self {
            id: id & id_mask,
            msg_type,
            payload,
        }
    }

    fn supports_fd(msg_type: u8) -> bool {
        N > CAN_MAX_DLEN && msg_type & PCAN_MESSAGE_FD != 0
    }

    /// Get the identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Get the `PCAN_MESSAGE_*` flags
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Get the payload
    pub fn payload(&self) -> &Payload<N> {
        &self.payload
    }

    /// Get frame data as a slice
    pub fn data(&self) -> &[u8] {
        self.payload.as_slice()
    }

    /// Get data length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the message carries no data
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Get the data length code
    pub fn dlc(&self) -> u8 {
        len_to_dlc(self.len(), self.is_fd())
    }

    /// Check if this is an extended ID frame (29-bit)
    pub fn is_extended_id(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_EXTENDED != 0
    }

    /// Check if this is a remote transmission request
    pub fn is_remote_frame(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_RTR != 0
    }

    /// Check if this is a CAN FD frame
    pub fn is_fd(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_FD != 0
    }

    /// Check if bit rate switch is enabled
    pub fn is_brs(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_BRS != 0
    }

    /// Check if the transmitter is error passive
    pub fn is_esi(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_ESI != 0
    }

    /// Check if this is an echo of a frame sent by this channel
    pub fn is_echo_frame(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_ECHO != 0
    }

    /// Check if this is an error frame
    pub fn is_error_frame(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_ERRFRAME != 0
    }

    /// Check if this is a driver status message
    pub fn is_status_frame(&self) -> bool {
        self.msg_type & PCAN_MESSAGE_STATUS != 0
    }
}

impl CanFdMessage {
    /// Create a CAN FD data frame
    ///
    /// # Arguments
    /// * `id` - CAN identifier
    /// * `data` - Frame data (up to 64 bytes)
    /// * `extended` - Use a 29-bit identifier
    /// * `brs` - Enable bit rate switch (transmit data at higher rate)
    pub fn fd(id: u32, data: &[u8], extended: bool, brs: bool) -> Result<Self> {
        let mut msg_type = PCAN_MESSAGE_FD;
        if extended {
            msg_type |= PCAN_MESSAGE_EXTENDED;
        }
        if brs {
            msg_type |= PCAN_MESSAGE_BRS;
        }
        Self::new(id, msg_type, data)
    }
}

impl<const N: usize> std::fmt::Display for Message<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fd_indicator = if self.is_fd() { " FD" } else { "" };
        let brs_indicator = if self.is_brs() { " BRS" } else { "" };

        let data_str = if self.is_remote_frame() {
            "remote request".to_string()
        } else {
            self.data()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        };

        write!(
            f,
            "{:>8X}{}{}   [{}]  {}",
            self.id,
            fd_indicator,
            brs_indicator,
            self.len(),
            data_str
        )
    }
}

impl<const N: usize> std::fmt::Debug for Message<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("id", &format_args!("0x{:08X}", self.id))
            .field("msg_type", &format_args!("0x{:02X}", self.msg_type))
            .field("len", &self.len())
            .field("data", &self.payload)
            .finish()
    }
}

/// Receive timestamp reported by the driver
///
/// Total microseconds are `micros + 1000 * millis + 1000 * 2^32 * millis_overflow`.
/// Comparison, equality and hashing all use that total, so `micros` values
/// above 999 compare equal to their carried form.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamp {
    /// Base-value: milliseconds, 0 to 2^32-1
    pub millis: u32,
    /// Roll-arounds of millis
    pub millis_overflow: u16,
    /// Microseconds, 0 to 999
    pub micros: u16,
}

impl Timestamp {
    /// Create a timestamp from its driver fields
    pub fn new(millis: u32, millis_overflow: u16, micros: u16) -> Self {
        Self {
            millis,
            millis_overflow,
            micros,
        }
    }

    /// Split a microsecond count into driver fields
    ///
    /// Millisecond counts beyond the overflow range wrap.
    pub fn from_micros(total: u64) -> Self {
        let millis = total / 1000;
        Self {
            millis: millis as u32,
            millis_overflow: (millis >> 32) as u16,
            micros: (total % 1000) as u16,
        }
    }

    /// Total time in microseconds
    pub fn total_micros(&self) -> u64 {
        let millis = ((self.millis_overflow as u64) << 32) | self.millis as u64;
        millis * 1000 + self.micros as u64
    }

    /// Total time as a `Duration`
    pub fn as_duration(&self) -> Duration {
        Duration::from_micros(self.total_micros())
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.total_micros() == other.total_micros()
    }
}

impl Eq for Timestamp {}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.total_micros().hash(state);
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_micros().cmp(&other.total_micros())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.total_micros();
        write!(f, "{}.{:06}", total / 1_000_000, total % 1_000_000)
    }
}

/// A message together with its receive timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received<M> {
    /// The received message
    pub message: M,
    /// When the driver received it
    pub timestamp: Timestamp,
}

impl<M> Received<M> {
    /// Pair a message with its timestamp
    pub fn new(message: M, timestamp: Timestamp) -> Self {
        Self { message, timestamp }
    }
}
