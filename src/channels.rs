//! Library-wide calls
//!
//! Operations that are not bound to one initialized channel: status code
//! descriptions, channel lookup and enumeration of attached hardware.

use log::debug;

use crate::bus::nul_terminated;
use crate::constants::{
    MAX_LENGTH_STRING_BUFFER, PCAN_ATTACHED_CHANNELS_COUNT, PCAN_CHANNEL_CONDITION,
    PCAN_NONEBUS, PCAN_USB_CHANNELS,
};
use crate::driver::Driver;
use crate::error::Result;
use crate::status::Status;
use crate::structures::{ChannelCondition, LookupQuery};

/// Get the driver's description of a status code
///
/// # Arguments
/// * `status` - Status to describe
/// * `language` - Language code (`PCAN_LANGUAGE_*`)
pub fn error_text(driver: &dyn Driver, status: Status, language: u16) -> Result<String> {
    let mut buffer = [0u8; MAX_LENGTH_STRING_BUFFER];
    driver
        .get_error_text(status, language, &mut buffer)?
        .into_result()?;
    Ok(nul_terminated(&buffer))
}

/// Find the channel handle matching `query`
pub fn lookup_channel(driver: &dyn Driver, query: &LookupQuery) -> Result<u16> {
    let parameters = query.to_cstring()?;
    let mut found = PCAN_NONEBUS;
    driver.lookup_channel(&parameters, &mut found)?.into_result()?;
    debug!("Lookup \"{}\" found channel 0x{:X}", query, found);
    Ok(found)
}

/// Number of channels the driver reports as attached
pub fn attached_channels_count(driver: &dyn Driver) -> Result<u32> {
    let mut buffer = [0u8; 4];
    driver
        .get_value(PCAN_NONEBUS, PCAN_ATTACHED_CHANNELS_COUNT, &mut buffer)?
        .into_result()?;
    Ok(u32::from_ne_bytes(buffer))
}

/// Get the condition of any channel, initialized or not
pub fn channel_condition(driver: &dyn Driver, channel: u16) -> Result<ChannelCondition> {
    let mut buffer = [0u8; 4];
    driver
        .get_value(channel, PCAN_CHANNEL_CONDITION, &mut buffer)?
        .into_result()?;
    Ok(ChannelCondition::from_raw(u32::from_ne_bytes(buffer)))
}

/// USB channels with hardware behind them
///
/// Probes `PCAN_USBBUS1` to `PCAN_USBBUS16` and keeps those that are
/// available, occupied or in use by PCAN-View.
pub fn attached_channels(driver: &dyn Driver) -> Result<Vec<u16>> {
    let mut attached = Vec::new();
    for &channel in PCAN_USB_CHANNELS.iter() {
        if channel_condition(driver, channel)?.is_present() {
            attached.push(channel);
        }
    }
    debug!("Found {} attached USB channels", attached.len());
    Ok(attached)
}

/// Uninitialize every channel initialized by this process
pub fn shutdown_all(driver: &dyn Driver) -> Result<()> {
    driver.uninitialize(PCAN_NONEBUS)?.into_result()
}
