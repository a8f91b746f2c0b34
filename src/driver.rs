//! Call marshaling seam
//!
//! [`Driver`] has one method per native entry point. Implementations hand
//! back the native status untouched; `Err` is reserved for failures on this
//! side of the boundary, such as calling into an unloaded library.
//! [`crate::PcanApi`] implements it over the real library.

use std::ffi::CStr;

use crate::constants::MAX_LENGTH_STRING_BUFFER;
use crate::error::Result;
use crate::status::Status;
use crate::structures::{RawMessage, RawMessageFd, RawTimestamp};

/// The PCAN-Basic entry points
pub trait Driver: Send + Sync {
    /// `CAN_Initialize`
    fn initialize(
        &self,
        channel: u16,
        btr0btr1: u16,
        hw_type: u8,
        io_port: u32,
        interrupt: u16,
    ) -> Result<Status>;

    /// `CAN_InitializeFD`
    fn initialize_fd(&self, channel: u16, bitrate: &CStr) -> Result<Status>;

    /// `CAN_Uninitialize`
    fn uninitialize(&self, channel: u16) -> Result<Status>;

    /// `CAN_Reset`
    fn reset(&self, channel: u16) -> Result<Status>;

    /// `CAN_GetStatus`
    fn get_status(&self, channel: u16) -> Result<Status>;

    /// `CAN_Read`
    fn read(
        &self,
        channel: u16,
        message: &mut RawMessage,
        timestamp: &mut RawTimestamp,
    ) -> Result<Status>;

    /// `CAN_ReadFD`, timestamp in microseconds
    fn read_fd(
        &self,
        channel: u16,
        message: &mut RawMessageFd,
        timestamp: &mut u64,
    ) -> Result<Status>;

    /// `CAN_Write`
    fn write(&self, channel: u16, message: &RawMessage) -> Result<Status>;

    /// `CAN_WriteFD`
    fn write_fd(&self, channel: u16, message: &RawMessageFd) -> Result<Status>;

    /// `CAN_FilterMessages`
    fn filter_messages(&self, channel: u16, from: u32, to: u32, mode: u8) -> Result<Status>;

    /// `CAN_GetValue`
    fn get_value(&self, channel: u16, parameter: u8, buffer: &mut [u8]) -> Result<Status>;

    /// `CAN_SetValue`
    fn set_value(&self, channel: u16, parameter: u8, buffer: &[u8]) -> Result<Status>;

    /// `CAN_GetErrorText`
    fn get_error_text(
        &self,
        status: Status,
        language: u16,
        buffer: &mut [u8; MAX_LENGTH_STRING_BUFFER],
    ) -> Result<Status>;

    /// `CAN_LookUpChannel`
    fn lookup_channel(&self, parameters: &CStr, found: &mut u16) -> Result<Status>;
}
