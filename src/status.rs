//! PCAN-Basic status codes
//!
//! Every native entry point returns a `TPCANStatus`. [`Status`] wraps that
//! value and names the codes defined by the driver.

use crate::error::{PcanError, Result};

/// Status code returned by a PCAN-Basic call
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(pub u32);

impl Status {
    /// No error
    pub const OK: Status = Status(0x00000);
    /// Transmit buffer in CAN controller is full
    pub const XMTFULL: Status = Status(0x00001);
    /// CAN controller was read too late
    pub const OVERRUN: Status = Status(0x00002);
    /// Bus error: an error counter reached the 'light' limit
    pub const BUSLIGHT: Status = Status(0x00004);
    /// Bus error: an error counter reached the 'heavy' limit
    pub const BUSHEAVY: Status = Status(0x00008);
    /// Bus error: an error counter reached the 'warning' limit
    pub const BUSWARNING: Status = Status::BUSHEAVY;
    /// Bus error: the CAN controller is error passive
    pub const BUSPASSIVE: Status = Status(0x40000);
    /// Bus error: the CAN controller is in bus-off state
    pub const BUSOFF: Status = Status(0x00010);
    /// Mask for all bus errors
    pub const ANYBUSERR: Status = Status(0x00004 | 0x00008 | 0x00010 | 0x40000);
    /// Receive queue is empty
    pub const QRCVEMPTY: Status = Status(0x00020);
    /// Receive queue was read too late
    pub const QOVERRUN: Status = Status(0x00040);
    /// Transmit queue is full
    pub const QXMTFULL: Status = Status(0x00080);
    /// Test of the CAN controller hardware registers failed (no hardware found)
    pub const REGTEST: Status = Status(0x00100);
    /// Driver not loaded
    pub const NODRIVER: Status = Status(0x00200);
    /// Hardware already in use by a Net
    pub const HWINUSE: Status = Status(0x00400);
    /// A Client is already connected to the Net
    pub const NETINUSE: Status = Status(0x00800);
    /// Hardware handle is invalid
    pub const ILLHW: Status = Status(0x01400);
    /// Net handle is invalid
    pub const ILLNET: Status = Status(0x01800);
    /// Client handle is invalid
    pub const ILLCLIENT: Status = Status(0x01C00);
    /// Mask for all handle errors
    pub const ILLHANDLE: Status = Status(0x01400 | 0x01800 | 0x01C00);
    /// Resource (FIFO, Client, timeout) cannot be created
    pub const RESOURCE: Status = Status(0x02000);
    /// Invalid parameter
    pub const ILLPARAMTYPE: Status = Status(0x04000);
    /// Invalid parameter value
    pub const ILLPARAMVAL: Status = Status(0x08000);
    /// Unknown error
    pub const UNKNOWN: Status = Status(0x10000);
    /// Invalid data, function, or action
    pub const ILLDATA: Status = Status(0x20000);
    /// Driver object state is wrong for the attempted operation
    pub const ILLMODE: Status = Status(0x80000);
    /// An operation was successfully carried out, however, irregularities were registered
    pub const CAUTION: Status = Status(0x2000000);
    /// Channel is not initialized
    pub const INITIALIZE: Status = Status(0x4000000);
    /// Invalid operation
    pub const ILLOPERATION: Status = Status(0x8000000);

    /// Raw status value
    pub fn code(self) -> u32 {
        self.0
    }

    /// Check if the call succeeded
    pub fn is_ok(self) -> bool {
        self == Status::OK
    }

    /// Check if this is the empty receive queue outcome of a read
    pub fn is_queue_empty(self) -> bool {
        self == Status::QRCVEMPTY
    }

    /// Check if any bus error bit is set
    pub fn is_bus_error(self) -> bool {
        self.0 & Status::ANYBUSERR.0 != 0
    }

    /// Convert into a `Result`, mapping every non-OK value to [`PcanError::Status`]
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(PcanError::Status(self))
        }
    }

    /// Get human-readable name for the status
    pub fn name(self) -> &'static str {
        match self {
            Status::OK => "OK",
            Status::XMTFULL => "XMTFULL",
            Status::OVERRUN => "OVERRUN",
            Status::BUSLIGHT => "BUSLIGHT",
            Status::BUSHEAVY => "BUSHEAVY",
            Status::BUSPASSIVE => "BUSPASSIVE",
            Status::BUSOFF => "BUSOFF",
            Status::ANYBUSERR => "ANYBUSERR",
            Status::QRCVEMPTY => "QRCVEMPTY",
            Status::QOVERRUN => "QOVERRUN",
            Status::QXMTFULL => "QXMTFULL",
            Status::REGTEST => "REGTEST",
            Status::NODRIVER => "NODRIVER",
            Status::HWINUSE => "HWINUSE",
            Status::NETINUSE => "NETINUSE",
            Status::ILLHW => "ILLHW",
            Status::ILLNET => "ILLNET",
            Status::ILLCLIENT => "ILLCLIENT",
            Status::ILLHANDLE => "ILLHANDLE",
            Status::RESOURCE => "RESOURCE",
            Status::ILLPARAMTYPE => "ILLPARAMTYPE",
            Status::ILLPARAMVAL => "ILLPARAMVAL",
            Status::UNKNOWN => "UNKNOWN",
            Status::ILLDATA => "ILLDATA",
            Status::ILLMODE => "ILLMODE",
            Status::CAUTION => "CAUTION",
            Status::INITIALIZE => "INITIALIZE",
            Status::ILLOPERATION => "ILLOPERATION",
            _ if self.is_bus_error() => "BUSERROR",
            _ => "UNDEFINED",
        }
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        Status(code)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:05X})", self.name(), self.0)
    }
}

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Status({})", self)
    }
}
