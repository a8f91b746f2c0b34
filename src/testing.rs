//! In-memory driver for unit tests
//!
//! Writes loop back into the receive queue with increasing timestamps. Every
//! entry point bumps a call counter, and [`StubDriver::unload`] makes all
//! further calls fail like an unloaded library.

use std::collections::{HashMap, VecDeque};
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::constants::{
    MAX_LENGTH_STRING_BUFFER, PCAN_ATTACHED_CHANNELS_COUNT, PCAN_CHANNEL_CONDITION,
    PCAN_CHANNEL_UNAVAILABLE, PCAN_RECEIVE_EVENT,
};
use crate::driver::Driver;
use crate::error::{PcanError, Result};
use crate::frame::{CanFdMessage, CanMessage};
use crate::status::Status;
use crate::structures::{RawMessage, RawMessageFd, RawTimestamp};

/// Microseconds between two looped back frames
const TICK_US: u64 = 100;

#[derive(Default)]
struct State {
    loaded: bool,
    clock_us: u64,
    queue: VecDeque<(RawMessage, u64)>,
    fd_queue: VecDeque<(RawMessageFd, u64)>,
    calls: HashMap<&'static str, usize>,
    values: HashMap<(u16, u8), Vec<u8>>,
    conditions: HashMap<u16, u32>,
    receive_fd: Option<i32>,
    bus_status: Status,
    read_failure: Option<(usize, Status)>,
    init_status: Status,
    last_filter: Option<(u16, u32, u32, u8)>,
    last_bitrate_fd: Option<String>,
    last_lookup: Option<String>,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock_us += TICK_US;
        self.clock_us
    }
}

/// Loopback [`Driver`] without hardware
pub struct StubDriver {
    state: Mutex<State>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                loaded: true,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and fail if unloaded
    fn enter(&self, name: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(name).or_default() += 1;
        if state.loaded {
            Ok(state)
        } else {
            Err(PcanError::NotLoaded)
        }
    }

    /// Number of calls to the entry point `name`, e.g. `"set_value"`
    pub fn calls(&self, name: &str) -> usize {
        self.lock().calls.get(name).copied().unwrap_or(0)
    }

    pub fn unload(&self) {
        self.lock().loaded = false;
    }

    /// Queue a classic frame as if received from the bus
    pub fn push(&self, message: &CanMessage) {
        let mut state = self.lock();
        let ts = state.tick();
        state.queue.push_back((RawMessage::from(message), ts));
    }

    /// Queue an FD frame as if received from the bus
    pub fn push_fd(&self, message: &CanFdMessage) {
        let mut state = self.lock();
        let ts = state.tick();
        state.fd_queue.push_back((RawMessageFd::from(message), ts));
    }

    /// Frames still waiting in the classic queue
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Let `reads` more reads succeed, then fail every read with `status`
    pub fn fail_reads_after(&self, reads: usize, status: Status) {
        self.lock().read_failure = Some((reads, status));
    }

    pub fn set_init_status(&self, status: Status) {
        self.lock().init_status = status;
    }

    pub fn set_bus_status(&self, status: Status) {
        self.lock().bus_status = status;
    }

    pub fn set_condition(&self, channel: u16, condition: u32) {
        self.lock().conditions.insert(channel, condition);
    }

    /// Expose `fd` through `PCAN_RECEIVE_EVENT`
    pub fn set_receive_fd(&self, fd: i32) {
        self.lock().receive_fd = Some(fd);
    }

    /// Last value stored through `set_value`
    pub fn value(&self, channel: u16, parameter: u8) -> Option<Vec<u8>> {
        self.lock().values.get(&(channel, parameter)).cloned()
    }

    /// Last value stored through `set_value`, decoded as `u32`
    pub fn value_u32(&self, channel: u16, parameter: u8) -> Option<u32> {
        let bytes = self.value(channel, parameter)?;
        Some(u32::from_ne_bytes(bytes.get(..4)?.try_into().ok()?))
    }

    /// Preload a value returned by `get_value`
    pub fn store_value(&self, channel: u16, parameter: u8, bytes: &[u8]) {
        self.lock().values.insert((channel, parameter), bytes.to_vec());
    }

    pub fn last_filter(&self) -> Option<(u16, u32, u32, u8)> {
        self.lock().last_filter
    }

    pub fn last_bitrate_fd(&self) -> Option<String> {
        self.lock().last_bitrate_fd.clone()
    }

    pub fn last_lookup(&self) -> Option<String> {
        self.lock().last_lookup.clone()
    }

    fn check_read(state: &mut State) -> Option<Status> {
        match state.read_failure.as_mut() {
            Some((0, status)) => Some(*status),
            Some((remaining, _)) => {
                *remaining -= 1;
                None
            }
            None => None,
        }
    }
}

impl Default for StubDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for StubDriver {
    fn initialize(&self, _channel: u16, _btr0btr1: u16, _hw: u8, _io: u32, _irq: u16) -> Result<Status> {
        Ok(self.enter("initialize")?.init_status)
    }

    fn initialize_fd(&self, _channel: u16, bitrate: &CStr) -> Result<Status> {
        let mut state = self.enter("initialize_fd")?;
        state.last_bitrate_fd = Some(bitrate.to_string_lossy().into_owned());
        Ok(state.init_status)
    }

    fn uninitialize(&self, _channel: u16) -> Result<Status> {
        self.enter("uninitialize")?;
        Ok(Status::OK)
    }

    fn reset(&self, _channel: u16) -> Result<Status> {
        let mut state = self.enter("reset")?;
        state.queue.clear();
        state.fd_queue.clear();
        Ok(Status::OK)
    }

    fn get_status(&self, _channel: u16) -> Result<Status> {
        Ok(self.enter("get_status")?.bus_status)
    }

    fn read(
        &self,
        _channel: u16,
        message: &mut RawMessage,
        timestamp: &mut RawTimestamp,
    ) -> Result<Status> {
        let mut state = self.enter("read")?;
        if let Some(status) = Self::check_read(&mut state) {
            return Ok(status);
        }
        match state.queue.pop_front() {
            Some((raw, ts)) => {
                *message = raw;
                *timestamp = crate::frame::Timestamp::from_micros(ts).into();
                Ok(Status::OK)
            }
            None => Ok(Status::QRCVEMPTY),
        }
    }

    fn read_fd(
        &self,
        _channel: u16,
        message: &mut RawMessageFd,
        timestamp: &mut u64,
    ) -> Result<Status> {
        let mut state = self.enter("read_fd")?;
        if let Some(status) = Self::check_read(&mut state) {
            return Ok(status);
        }
        match state.fd_queue.pop_front() {
            Some((raw, ts)) => {
                *message = raw;
                *timestamp = ts;
                Ok(Status::OK)
            }
            None => Ok(Status::QRCVEMPTY),
        }
    }

    fn write(&self, _channel: u16, message: &RawMessage) -> Result<Status> {
        let mut state = self.enter("write")?;
        let ts = state.tick();
        state.queue.push_back((*message, ts));
        Ok(Status::OK)
    }

    fn write_fd(&self, _channel: u16, message: &RawMessageFd) -> Result<Status> {
        let mut state = self.enter("write_fd")?;
        let ts = state.tick();
        state.fd_queue.push_back((*message, ts));
        Ok(Status::OK)
    }

    fn filter_messages(&self, channel: u16, from: u32, to: u32, mode: u8) -> Result<Status> {
        let mut state = self.enter("filter_messages")?;
        state.last_filter = Some((channel, from, to, mode));
        Ok(Status::OK)
    }

    fn get_value(&self, channel: u16, parameter: u8, buffer: &mut [u8]) -> Result<Status> {
        let state = self.enter("get_value")?;
        let bytes = match parameter {
            PCAN_RECEIVE_EVENT => match state.receive_fd {
                Some(fd) => fd.to_ne_bytes().to_vec(),
                None => return Ok(Status::ILLPARAMTYPE),
            },
            PCAN_CHANNEL_CONDITION => state
                .conditions
                .get(&channel)
                .copied()
                .unwrap_or(PCAN_CHANNEL_UNAVAILABLE)
                .to_ne_bytes()
                .to_vec(),
            PCAN_ATTACHED_CHANNELS_COUNT => {
                let count = state.conditions.values().filter(|&&c| c != 0).count() as u32;
                count.to_ne_bytes().to_vec()
            }
            _ => match state.values.get(&(channel, parameter)) {
                Some(bytes) => bytes.clone(),
                None => return Ok(Status::ILLPARAMTYPE),
            },
        };
        if bytes.len() > buffer.len() {
            return Ok(Status::ILLPARAMVAL);
        }
        buffer[..bytes.len()].copy_from_slice(&bytes);
        Ok(Status::OK)
    }

    fn set_value(&self, channel: u16, parameter: u8, buffer: &[u8]) -> Result<Status> {
        let mut state = self.enter("set_value")?;
        if parameter == PCAN_RECEIVE_EVENT {
            return Ok(Status::ILLPARAMTYPE);
        }
        state.values.insert((channel, parameter), buffer.to_vec());
        Ok(Status::OK)
    }

    fn get_error_text(
        &self,
        status: Status,
        _language: u16,
        buffer: &mut [u8; MAX_LENGTH_STRING_BUFFER],
    ) -> Result<Status> {
        self.enter("get_error_text")?;
        let text = format!("Stub error {}", status.name());
        buffer.fill(0);
        buffer[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Status::OK)
    }

    fn lookup_channel(&self, parameters: &CStr, found: &mut u16) -> Result<Status> {
        let mut state = self.enter("lookup_channel")?;
        let query = parameters.to_string_lossy().into_owned();
        let status = if query.contains("devicetype=PCAN_USB") {
            *found = crate::constants::PCAN_USBBUS1;
            Status::OK
        } else {
            Status::ILLPARAMVAL
        };
        state.last_lookup = Some(query);
        Ok(status)
    }
}
