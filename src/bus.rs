//! PCAN channel implementation
//!
//! This module provides [`PcanBus`], an initialized PCAN-Basic channel. It
//! remembers how the channel was configured, owns the channel's receive wait
//! primitive and uninitializes the channel when dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::constants::{
    MAX_LENGTH_STRING_BUFFER, PCAN_ALLOW_ECHO_FRAMES, PCAN_ALLOW_ERROR_FRAMES,
    PCAN_ALLOW_RTR_FRAMES, PCAN_ALLOW_STATUS_FRAMES, PCAN_CHANNEL_CONDITION,
    PCAN_CHANNEL_IDENTIFYING, PCAN_FILTER_OPEN, PCAN_MESSAGE_FILTER, PCAN_PARAMETER_OFF,
    PCAN_PARAMETER_ON, PCAN_TRACE_CONFIGURE, PCAN_TRACE_LOCATION, PCAN_TRACE_SIZE,
    PCAN_TRACE_STATUS,
};
use crate::driver::Driver;
use crate::error::{PcanError, Result};
use crate::frame::{CanFdMessage, CanMessage, Received, Timestamp};
use crate::library::PcanApi;
use crate::status::Status;
use crate::structures::{
    BitrateFd, BusConfig, ChannelCondition, FilterMode, RawMessage, RawMessageFd, RawTimestamp,
    TraceConfig,
};
use crate::wait::{self, ReceiveWait, SleepWait, WaitOutcome};

/// How a channel was initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    /// Classic CAN through `CAN_Initialize`
    Classic(BusConfig),
    /// CAN FD through `CAN_InitializeFD`
    Fd(BitrateFd),
}

/// Initialized PCAN-Basic channel
///
/// All operations take `&mut self`; share a channel between threads behind a
/// `Mutex`. The driver itself can be shared between channels.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pcan_basic::{CanMessage, PcanApi, PcanBus, PCAN_BAUD_500K, PCAN_USBBUS1};
///
/// let api = Arc::new(PcanApi::open()?);
/// let mut bus = PcanBus::initialize_basic(api, PCAN_USBBUS1, PCAN_BAUD_500K)?;
///
/// bus.write(&CanMessage::standard(0x123, &[0x01, 0x02, 0x03, 0x04])?)?;
///
/// match bus.read_timeout(Some(Duration::from_millis(100)))? {
///     Some(rx) => println!("RX: {} @ {}", rx.message, rx.timestamp),
///     None => println!("No frame"),
/// }
/// # Ok::<(), pcan_basic::PcanError>(())
/// ```
pub struct PcanBus<D: Driver = PcanApi> {
    driver: Arc<D>,
    channel: u16,
    mode: BusMode,
    waiter: Box<dyn ReceiveWait>,
    initialized: bool,
}

impl<D: Driver> PcanBus<D> {
    /// Initialize a plug and play channel
    ///
    /// # Arguments
    /// * `channel` - Channel handle (`PCAN_USBBUS1`, ...)
    /// * `baudrate` - BTR0BTR1 code (`PCAN_BAUD_*`)
    pub fn initialize_basic(driver: Arc<D>, channel: u16, baudrate: u16) -> Result<Self> {
        Self::initialize(driver, channel, BusConfig::new(baudrate))
    }

    /// Initialize a classic channel
    pub fn initialize(driver: Arc<D>, channel: u16, config: BusConfig) -> Result<Self> {
        driver
            .initialize(
                channel,
                config.baudrate,
                config.hw_type,
                config.io_port,
                config.interrupt,
            )?
            .into_result()?;
        debug!(
            "Channel 0x{:X} initialized (baudrate 0x{:04X})",
            channel, config.baudrate
        );
        Ok(Self::opened(driver, channel, BusMode::Classic(config)))
    }

    /// Initialize a CAN FD channel
    pub fn initialize_fd(driver: Arc<D>, channel: u16, bitrate: &BitrateFd) -> Result<Self> {
        let encoded = bitrate.to_cstring()?;
        driver.initialize_fd(channel, &encoded)?.into_result()?;
        debug!("Channel 0x{:X} initialized for CAN FD ({})", channel, bitrate);
        Ok(Self::opened(driver, channel, BusMode::Fd(*bitrate)))
    }

    fn opened(driver: Arc<D>, channel: u16, mode: BusMode) -> Self {
        let waiter = wait::detect(&*driver, channel);
        Self {
            driver,
            channel,
            mode,
            waiter,
            initialized: true,
        }
    }

    /// Replace the receive wait primitive
    ///
    /// The current one is released first.
    pub fn set_receive_wait(&mut self, waiter: Box<dyn ReceiveWait>) -> Result<()> {
        let old = std::mem::replace(&mut self.waiter, waiter);
        release(old, &*self.driver, self.channel)
    }

    /// Channel handle
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Configuration used at initialization
    pub fn mode(&self) -> BusMode {
        self.mode
    }

    /// Shared driver
    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Check if the channel has not been uninitialized yet
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Check if blocking reads are woken by the driver rather than polling
    pub fn is_event_driven(&self) -> bool {
        self.waiter.is_event_driven()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PcanError::ChannelClosed)
        }
    }

    /// Uninitialize the channel
    ///
    /// Releases the receive wait primitive. Calling it again does nothing.
    /// If both steps fail, the driver's error is returned and the release
    /// error is logged.
    pub fn uninitialize(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let waiter = std::mem::replace(&mut self.waiter, Box::new(SleepWait));
        let released = release(waiter, &*self.driver, self.channel);
        let closed = self
            .driver
            .uninitialize(self.channel)
            .and_then(Status::into_result);
        debug!("Channel 0x{:X} uninitialized", self.channel);

        match (closed, released) {
            (Err(e), Err(dropped)) => {
                warn!(
                    "Failed to release receive wait of channel 0x{:X}: {}",
                    self.channel, dropped
                );
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Reset the receive and transmit queues
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.driver.reset(self.channel)?.into_result()
    }

    /// Get the bus status
    ///
    /// Bus error states (`BUSLIGHT`, `BUSHEAVY`, `BUSPASSIVE`, `BUSOFF`) are
    /// reported as `Ok`; any other non-OK status is an error.
    pub fn status(&mut self) -> Result<Status> {
        self.ensure_initialized()?;
        let status = self.driver.get_status(self.channel)?;
        if status.code() & !Status::ANYBUSERR.code() == 0 {
            Ok(status)
        } else {
            Err(PcanError::Status(status))
        }
    }

    /// Read one frame without blocking
    ///
    /// Returns `Ok(None)` if the receive queue is empty.
    pub fn read(&mut self) -> Result<Option<Received<CanMessage>>> {
        self.ensure_initialized()?;
        let mut raw = RawMessage::default();
        let mut timestamp = RawTimestamp::default();
        let status = self.driver.read(self.channel, &mut raw, &mut timestamp)?;
        if status.is_queue_empty() {
            return Ok(None);
        }
        status.into_result()?;
        Ok(Some(Received::new(CanMessage::from(&raw), timestamp.into())))
    }

    /// Read one CAN FD frame without blocking
    ///
    /// Returns `Ok(None)` if the receive queue is empty.
    pub fn read_fd(&mut self) -> Result<Option<Received<CanFdMessage>>> {
        self.ensure_initialized()?;
        let mut raw = RawMessageFd::default();
        let mut timestamp = 0u64;
        let status = self.driver.read_fd(self.channel, &mut raw, &mut timestamp)?;
        if status.is_queue_empty() {
            return Ok(None);
        }
        status.into_result()?;
        Ok(Some(Received::new(
            CanFdMessage::from(&raw),
            Timestamp::from_micros(timestamp),
        )))
    }

    /// Read one frame, waiting at most `timeout`
    ///
    /// # Arguments
    /// * `timeout` - Maximum wait, `None` to wait until a frame arrives
    ///
    /// # Returns
    /// The first frame available, or `Ok(None)` once the timeout has elapsed.
    /// The receive queue is checked at least once, even for a zero timeout.
    pub fn read_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Received<CanMessage>>> {
        self.poll(timeout, Self::read)
    }

    /// Read one frame, waiting at most `timeout_ms` milliseconds
    ///
    /// A negative timeout waits until a frame arrives.
    pub fn read_timeout_ms(&mut self, timeout_ms: i64) -> Result<Option<Received<CanMessage>>> {
        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        self.read_timeout(timeout)
    }

    /// Read one CAN FD frame, waiting at most `timeout`
    pub fn read_fd_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Received<CanFdMessage>>> {
        self.poll(timeout, Self::read_fd)
    }

    fn poll<T>(
        &mut self,
        timeout: Option<Duration>,
        mut read: impl FnMut(&mut Self) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        // A deadline past the clock's range counts as no deadline
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            if let Some(frame) = read(self)? {
                return Ok(Some(frame));
            }

            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            match self.waiter.wait(remaining)? {
                WaitOutcome::Ready => {}
                WaitOutcome::TimedOut if deadline.is_some() => return Ok(None),
                WaitOutcome::TimedOut => {}
            }
        }
    }

    /// Read every queued frame without blocking
    ///
    /// # Arguments
    /// * `limit` - Stop after this many frames, 0 for no limit
    ///
    /// # Returns
    /// Frames in arrival order. If a read fails after some frames were
    /// taken, they are handed back in [`PcanError::PartialRead`].
    pub fn read_all(&mut self, limit: usize) -> Result<Vec<Received<CanMessage>>> {
        let mut received = Vec::new();
        while limit == 0 || received.len() < limit {
            match self.read() {
                Ok(Some(frame)) => received.push(frame),
                Ok(None) => break,
                Err(source) if received.is_empty() => return Err(source),
                Err(source) => {
                    return Err(PcanError::PartialRead {
                        received,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(received)
    }

    /// Transmit a CAN frame
    pub fn write(&mut self, message: &CanMessage) -> Result<()> {
        self.ensure_initialized()?;
        self.driver
            .write(self.channel, &RawMessage::from(message))?
            .into_result()
    }

    /// Transmit a CAN FD frame
    pub fn write_fd(&mut self, message: &CanFdMessage) -> Result<()> {
        self.ensure_initialized()?;
        self.driver
            .write_fd(self.channel, &RawMessageFd::from(message))?
            .into_result()
    }

    /// Configure the reception filter
    ///
    /// # Arguments
    /// * `from` - Lowest identifier to receive
    /// * `to` - Highest identifier to receive
    /// * `mode` - Identifier width of the range
    ///
    /// Repeated calls widen the accepted range.
    pub fn set_filter(&mut self, from: u32, to: u32, mode: FilterMode) -> Result<()> {
        self.ensure_initialized()?;
        self.driver
            .filter_messages(self.channel, from, to, mode.as_raw())?
            .into_result()
    }

    /// Open the reception filter to all frames
    pub fn reset_filter(&mut self) -> Result<()> {
        self.set_parameter(PCAN_MESSAGE_FILTER, PCAN_FILTER_OPEN)
    }

    /// Get a numeric channel parameter
    pub fn get_parameter(&mut self, parameter: u8) -> Result<u32> {
        let mut buffer = [0u8; 4];
        self.get_value(parameter, &mut buffer)?;
        Ok(u32::from_ne_bytes(buffer))
    }

    /// Set a numeric channel parameter
    pub fn set_parameter(&mut self, parameter: u8, value: u32) -> Result<()> {
        self.set_value(parameter, &value.to_ne_bytes())
    }

    /// Get a channel parameter into `buffer`
    pub fn get_value(&mut self, parameter: u8, buffer: &mut [u8]) -> Result<()> {
        self.ensure_initialized()?;
        self.driver
            .get_value(self.channel, parameter, buffer)?
            .into_result()
    }

    /// Set a channel parameter from `buffer`
    pub fn set_value(&mut self, parameter: u8, buffer: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        self.driver
            .set_value(self.channel, parameter, buffer)?
            .into_result()
    }

    /// Get a string channel parameter such as `PCAN_HARDWARE_NAME`
    pub fn get_string(&mut self, parameter: u8) -> Result<String> {
        let mut buffer = [0u8; MAX_LENGTH_STRING_BUFFER];
        self.get_value(parameter, &mut buffer)?;
        Ok(nul_terminated(&buffer))
    }

    fn set_flag(&mut self, parameter: u8, on: bool) -> Result<()> {
        let value = if on { PCAN_PARAMETER_ON } else { PCAN_PARAMETER_OFF };
        self.set_parameter(parameter, value)
    }

    /// Allow or forbid receiving status frames
    pub fn set_allow_status_frames(&mut self, allow: bool) -> Result<()> {
        self.set_flag(PCAN_ALLOW_STATUS_FRAMES, allow)
    }

    /// Allow or forbid receiving remote transmission requests
    pub fn set_allow_rtr_frames(&mut self, allow: bool) -> Result<()> {
        self.set_flag(PCAN_ALLOW_RTR_FRAMES, allow)
    }

    /// Allow or forbid receiving error frames
    pub fn set_allow_error_frames(&mut self, allow: bool) -> Result<()> {
        self.set_flag(PCAN_ALLOW_ERROR_FRAMES, allow)
    }

    /// Allow or forbid receiving echoes of transmitted frames
    pub fn set_allow_echo_frames(&mut self, allow: bool) -> Result<()> {
        self.set_flag(PCAN_ALLOW_ECHO_FRAMES, allow)
    }

    /// Turn the identification LED blinking on or off
    pub fn set_identifying(&mut self, on: bool) -> Result<()> {
        self.set_flag(PCAN_CHANNEL_IDENTIFYING, on)
    }

    /// Get the availability of this channel
    pub fn channel_condition(&mut self) -> Result<ChannelCondition> {
        self.get_parameter(PCAN_CHANNEL_CONDITION)
            .map(ChannelCondition::from_raw)
    }

    /// Start recording a trace
    ///
    /// The size limit and location are checked before anything is sent to
    /// the driver. Frames are only traced while they are being read.
    pub fn start_trace(&mut self, config: &TraceConfig) -> Result<()> {
        let location = config.validate()?;
        self.ensure_initialized()?;

        self.set_parameter(PCAN_TRACE_CONFIGURE, config.flags())?;
        if config.max_file_size_mb > 0 {
            self.set_parameter(PCAN_TRACE_SIZE, config.max_file_size_mb)?;
        }
        self.set_value(PCAN_TRACE_LOCATION, &location)?;
        self.set_parameter(PCAN_TRACE_STATUS, PCAN_PARAMETER_ON)?;
        debug!(
            "Channel 0x{:X} tracing to {}",
            self.channel,
            config.location.display()
        );
        Ok(())
    }

    /// Stop recording the trace
    pub fn stop_trace(&mut self) -> Result<()> {
        self.set_parameter(PCAN_TRACE_STATUS, PCAN_PARAMETER_OFF)
    }
}

fn release(mut waiter: Box<dyn ReceiveWait>, driver: &dyn Driver, channel: u16) -> Result<()> {
    waiter.release(driver, channel)
}

/// Decode a NUL terminated driver string
pub(crate) fn nul_terminated(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

impl<D: Driver> std::fmt::Debug for PcanBus<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcanBus")
            .field("channel", &format_args!("0x{:X}", self.channel))
            .field("mode", &self.mode)
            .field("initialized", &self.initialized)
            .field("event_driven", &self.is_event_driven())
            .finish()
    }
}

impl<D: Driver> Drop for PcanBus<D> {
    fn drop(&mut self) {
        if let Err(e) = self.uninitialize() {
            warn!("Failed to uninitialize channel 0x{:X}: {}", self.channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::constants::{
        PCAN_BAUD_250K, PCAN_BAUD_500K, PCAN_CHANNEL_OCCUPIED, PCAN_HARDWARE_NAME,
        PCAN_MODE_EXTENDED, PCAN_USBBUS1, TRACE_FILE_DATE, TRACE_FILE_OVERWRITE,
        TRACE_FILE_SEGMENTED, TRACE_FILE_TIME,
    };
    use crate::testing::StubDriver;
    use crate::wait::POLL_INTERVAL;

    /// Slack for thread scheduling on loaded machines
    const TOLERANCE: Duration = Duration::from_millis(200);

    fn open() -> (Arc<StubDriver>, PcanBus<StubDriver>) {
        let driver = Arc::new(StubDriver::new());
        let bus = PcanBus::initialize_basic(Arc::clone(&driver), PCAN_USBBUS1, PCAN_BAUD_500K)
            .unwrap();
        (driver, bus)
    }

    fn frame(id: u32, byte: u8) -> CanMessage {
        CanMessage::standard(id, &[byte]).unwrap()
    }

    /// Waiter that counts releases
    struct CountingWait(Arc<AtomicUsize>);

    impl ReceiveWait for CountingWait {
        fn wait(&mut self, _timeout: Option<Duration>) -> Result<WaitOutcome> {
            Ok(WaitOutcome::Ready)
        }

        fn release(&mut self, _driver: &dyn Driver, _channel: u16) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Waiter that always times out and delivers a frame on its third wait
    struct LateWait {
        driver: Arc<StubDriver>,
        waits: usize,
    }

    impl ReceiveWait for LateWait {
        fn wait(&mut self, _timeout: Option<Duration>) -> Result<WaitOutcome> {
            self.waits += 1;
            if self.waits == 3 {
                self.driver.push(&frame(0x42, 3));
            }
            Ok(WaitOutcome::TimedOut)
        }
    }

    /// Waiter whose release fails
    struct BrokenReleaseWait;

    impl ReceiveWait for BrokenReleaseWait {
        fn wait(&mut self, _timeout: Option<Duration>) -> Result<WaitOutcome> {
            Ok(WaitOutcome::Ready)
        }

        fn release(&mut self, _driver: &dyn Driver, _channel: u16) -> Result<()> {
            Err(PcanError::Event(std::io::Error::other("close failed")))
        }
    }

    struct FailingWait;

    impl ReceiveWait for FailingWait {
        fn wait(&mut self, _timeout: Option<Duration>) -> Result<WaitOutcome> {
            Err(PcanError::Wait(std::io::Error::other("wait broke")))
        }
    }

    #[test]
    fn test_initialize_records_mode() {
        let (driver, bus) = open();
        assert!(bus.is_initialized());
        assert_eq!(bus.channel(), PCAN_USBBUS1);
        assert_eq!(bus.mode(), BusMode::Classic(BusConfig::new(PCAN_BAUD_500K)));
        assert!(!bus.is_event_driven());
        assert_eq!(driver.calls("initialize"), 1);
    }

    #[test]
    fn test_initialize_failure() {
        let driver = Arc::new(StubDriver::new());
        driver.set_init_status(Status::HWINUSE);
        let err = PcanBus::initialize_basic(Arc::clone(&driver), PCAN_USBBUS1, PCAN_BAUD_250K)
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::HWINUSE));
        assert_eq!(driver.calls("uninitialize"), 0);
    }

    #[test]
    fn test_initialize_fd() {
        let driver = Arc::new(StubDriver::new());
        let timing = BitrateFd::default();
        let mut bus = PcanBus::initialize_fd(Arc::clone(&driver), PCAN_USBBUS1, &timing).unwrap();
        assert_eq!(bus.mode(), BusMode::Fd(timing));
        assert_eq!(driver.last_bitrate_fd(), Some(timing.to_string()));

        let data: Vec<u8> = (0..24).collect();
        let msg = CanFdMessage::fd(0x1ABC_DEF0, &data, true, true).unwrap();
        bus.write_fd(&msg).unwrap();
        driver.push_fd(&msg);

        let first = bus.read_fd().unwrap().unwrap();
        let second = bus.read_fd_timeout(Some(Duration::ZERO)).unwrap().unwrap();
        assert_eq!(first.message, msg);
        assert_eq!(first.message.len(), 24);
        assert_eq!(first.message.dlc(), 12);
        assert_eq!(second.message, msg);
        assert!(first.timestamp < second.timestamp);
        assert!(bus.read_fd().unwrap().is_none());
    }

    #[test]
    fn test_loopback_round_trip() {
        let (_driver, mut bus) = open();
        let msg = CanMessage::standard(0x123, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        bus.write(&msg).unwrap();
        bus.write(&msg).unwrap();

        let first = bus.read().unwrap().unwrap();
        let second = bus.read().unwrap().unwrap();
        assert_eq!(first.message, msg);
        assert_eq!(first.message.id(), 0x123);
        assert_eq!(first.message.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(second.message, msg);
        assert!(first.timestamp <= second.timestamp);
    }

    #[test]
    fn test_read_empty_queue() {
        let (_driver, mut bus) = open();
        assert!(bus.read().unwrap().is_none());
    }

    #[test]
    fn test_read_timeout_elapses() {
        let (_driver, mut bus) = open();
        let timeout = Duration::from_millis(20);

        let start = Instant::now();
        assert!(bus.read_timeout(Some(timeout)).unwrap().is_none());
        let elapsed = start.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + POLL_INTERVAL + TOLERANCE);
    }

    #[test]
    fn test_read_timeout_zero_reads_once() {
        let (driver, mut bus) = open();
        let before = driver.calls("read");
        assert!(bus.read_timeout(Some(Duration::ZERO)).unwrap().is_none());
        assert!(driver.calls("read") > before);

        driver.push(&frame(0x10, 1));
        let rx = bus.read_timeout_ms(0).unwrap().unwrap();
        assert_eq!(rx.message.id(), 0x10);
    }

    #[test]
    fn test_read_timeout_returns_queued_frame() {
        let (driver, mut bus) = open();
        driver.push(&frame(0x11, 1));
        driver.push(&frame(0x12, 2));

        let rx = bus.read_timeout(Some(Duration::from_secs(5))).unwrap().unwrap();
        assert_eq!(rx.message.id(), 0x11);
        assert_eq!(driver.pending(), 1);
    }

    #[test]
    fn test_negative_timeout_waits_for_data() {
        let (driver, mut bus) = open();
        let producer = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                driver.push(&frame(0x7FF, 0xAA));
            })
        };

        let rx = bus.read_timeout_ms(-1).unwrap().unwrap();
        assert_eq!(rx.message.id(), 0x7FF);
        assert_eq!(rx.message.data(), &[0xAA]);
        producer.join().unwrap();
    }

    #[test]
    fn test_timed_out_wait_without_deadline_keeps_reading() {
        let (driver, mut bus) = open();
        bus.set_receive_wait(Box::new(LateWait {
            driver: Arc::clone(&driver),
            waits: 0,
        }))
        .unwrap();

        let rx = bus.read_timeout(None).unwrap().unwrap();
        assert_eq!(rx.message.id(), 0x42);
    }

    #[test]
    fn test_timed_out_wait_ends_bounded_read() {
        let (driver, mut bus) = open();
        bus.set_receive_wait(Box::new(LateWait {
            driver: Arc::clone(&driver),
            waits: 0,
        }))
        .unwrap();

        let start = Instant::now();
        assert!(bus.read_timeout(Some(Duration::from_secs(10))).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(driver.calls("read"), 1);
    }

    #[test]
    fn test_wait_failure_is_propagated() {
        let (_driver, mut bus) = open();
        bus.set_receive_wait(Box::new(FailingWait)).unwrap();
        let err = bus.read_timeout(Some(Duration::from_secs(1))).unwrap_err();
        assert!(matches!(err, PcanError::Wait(_)));
    }

    #[test]
    fn test_read_error_is_returned_immediately() {
        let (driver, mut bus) = open();
        driver.fail_reads_after(0, Status::ILLHW);

        let start = Instant::now();
        let err = bus.read_timeout(Some(Duration::from_secs(5))).unwrap_err();
        assert_eq!(err.status(), Some(Status::ILLHW));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(driver.calls("read"), 1);
    }

    #[test]
    fn test_read_all_with_limit() {
        let (driver, mut bus) = open();
        for i in 0..5 {
            driver.push(&frame(0x100 + i, i as u8));
        }

        let first = bus.read_all(3).unwrap();
        let ids: Vec<u32> = first.iter().map(|rx| rx.message.id()).collect();
        assert_eq!(ids, vec![0x100, 0x101, 0x102]);
        assert_eq!(driver.pending(), 2);

        let rest = bus.read_all(0).unwrap();
        let ids: Vec<u32> = rest.iter().map(|rx| rx.message.id()).collect();
        assert_eq!(ids, vec![0x103, 0x104]);
        assert!(bus.read_all(0).unwrap().is_empty());
    }

    #[test]
    fn test_read_all_unbounded() {
        let (driver, mut bus) = open();
        for i in 0..5 {
            driver.push(&frame(0x200 + i, i as u8));
        }
        let frames = bus.read_all(0).unwrap();
        assert_eq!(frames.len(), 5);
        assert!(frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(driver.pending(), 0);
    }

    #[test]
    fn test_read_all_keeps_frames_on_failure() {
        let (driver, mut bus) = open();
        for i in 0..5 {
            driver.push(&frame(0x300 + i, i as u8));
        }
        driver.fail_reads_after(2, Status::BUSOFF);

        match bus.read_all(0) {
            Err(PcanError::PartialRead { received, source }) => {
                assert_eq!(received.len(), 2);
                assert_eq!(received[0].message.id(), 0x300);
                assert_eq!(received[1].message.id(), 0x301);
                assert_eq!(source.status(), Some(Status::BUSOFF));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_trace_path_is_rejected_locally() {
        let (driver, mut bus) = open();
        let before = driver.calls("set_value");

        let err = bus
            .start_trace(&TraceConfig::new("x".repeat(300), 10))
            .unwrap_err();
        assert!(matches!(err, PcanError::PathTooLong { len: 300, .. }));

        let err = bus.start_trace(&TraceConfig::new("/tmp", 500)).unwrap_err();
        assert!(matches!(err, PcanError::TraceFileTooLarge { size: 500, .. }));

        assert_eq!(driver.calls("set_value"), before);
    }

    #[test]
    fn test_start_and_stop_trace() {
        let (driver, mut bus) = open();
        bus.start_trace(&TraceConfig::new("/var/log/can", 10)).unwrap();

        assert_eq!(
            driver.value_u32(PCAN_USBBUS1, PCAN_TRACE_CONFIGURE),
            Some(TRACE_FILE_SEGMENTED | TRACE_FILE_DATE | TRACE_FILE_TIME | TRACE_FILE_OVERWRITE)
        );
        assert_eq!(driver.value_u32(PCAN_USBBUS1, PCAN_TRACE_SIZE), Some(10));
        let location = driver.value(PCAN_USBBUS1, PCAN_TRACE_LOCATION).unwrap();
        assert_eq!(location.len(), MAX_LENGTH_STRING_BUFFER);
        assert_eq!(nul_terminated(&location), "/var/log/can");
        assert_eq!(
            driver.value_u32(PCAN_USBBUS1, PCAN_TRACE_STATUS),
            Some(PCAN_PARAMETER_ON)
        );

        bus.stop_trace().unwrap();
        assert_eq!(
            driver.value_u32(PCAN_USBBUS1, PCAN_TRACE_STATUS),
            Some(PCAN_PARAMETER_OFF)
        );
    }

    #[test]
    fn test_unloaded_driver() {
        let (driver, mut bus) = open();
        driver.unload();
        assert!(matches!(bus.read(), Err(PcanError::NotLoaded)));
        assert!(matches!(
            bus.write(&frame(0x1, 1)),
            Err(PcanError::NotLoaded)
        ));
        assert!(matches!(
            bus.read_timeout(Some(Duration::from_millis(5))),
            Err(PcanError::NotLoaded)
        ));
    }

    #[test]
    fn test_wait_released_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let (driver, mut bus) = open();
        bus.set_receive_wait(Box::new(CountingWait(Arc::clone(&released))))
            .unwrap();

        bus.uninitialize().unwrap();
        bus.uninitialize().unwrap();
        assert!(!bus.is_initialized());
        drop(bus);

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(driver.calls("uninitialize"), 1);
    }

    #[test]
    fn test_uninitialize_reports_release_failure() {
        let (driver, mut bus) = open();
        bus.set_receive_wait(Box::new(BrokenReleaseWait)).unwrap();

        assert!(matches!(bus.uninitialize(), Err(PcanError::Event(_))));
        assert_eq!(driver.calls("uninitialize"), 1);
        assert!(!bus.is_initialized());
    }

    #[test]
    fn test_uninitialize_prefers_driver_error() {
        let (driver, mut bus) = open();
        bus.set_receive_wait(Box::new(BrokenReleaseWait)).unwrap();
        driver.unload();

        assert!(matches!(bus.uninitialize(), Err(PcanError::NotLoaded)));
        assert!(bus.uninitialize().is_ok());
    }

    #[test]
    fn test_drop_uninitializes() {
        let released = Arc::new(AtomicUsize::new(0));
        let (driver, mut bus) = open();
        bus.set_receive_wait(Box::new(CountingWait(Arc::clone(&released))))
            .unwrap();
        drop(bus);

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(driver.calls("uninitialize"), 1);
    }

    #[test]
    fn test_closed_channel() {
        let (_driver, mut bus) = open();
        bus.uninitialize().unwrap();
        assert!(matches!(bus.read(), Err(PcanError::ChannelClosed)));
        assert!(matches!(bus.reset(), Err(PcanError::ChannelClosed)));
        assert!(matches!(
            bus.set_filter(0, 0x7FF, FilterMode::Standard),
            Err(PcanError::ChannelClosed)
        ));
    }

    #[test]
    fn test_filter() {
        let (driver, mut bus) = open();
        bus.set_filter(0x100, 0x1FF, FilterMode::Extended).unwrap();
        assert_eq!(
            driver.last_filter(),
            Some((PCAN_USBBUS1, 0x100, 0x1FF, PCAN_MODE_EXTENDED))
        );
        assert_eq!(driver.value(PCAN_USBBUS1, PCAN_MESSAGE_FILTER), None);

        bus.reset_filter().unwrap();
        assert_eq!(
            driver.value_u32(PCAN_USBBUS1, PCAN_MESSAGE_FILTER),
            Some(PCAN_FILTER_OPEN)
        );
    }

    #[test]
    fn test_flag_parameters() {
        let (driver, mut bus) = open();
        bus.set_allow_status_frames(true).unwrap();
        bus.set_allow_rtr_frames(false).unwrap();
        bus.set_allow_error_frames(true).unwrap();
        bus.set_allow_echo_frames(false).unwrap();
        bus.set_identifying(true).unwrap();

        let value = |param| driver.value_u32(PCAN_USBBUS1, param);
        assert_eq!(value(PCAN_ALLOW_STATUS_FRAMES), Some(PCAN_PARAMETER_ON));
        assert_eq!(value(PCAN_ALLOW_RTR_FRAMES), Some(PCAN_PARAMETER_OFF));
        assert_eq!(value(PCAN_ALLOW_ERROR_FRAMES), Some(PCAN_PARAMETER_ON));
        assert_eq!(value(PCAN_ALLOW_ECHO_FRAMES), Some(PCAN_PARAMETER_OFF));
        assert_eq!(value(PCAN_CHANNEL_IDENTIFYING), Some(PCAN_PARAMETER_ON));
        assert_eq!(bus.get_parameter(PCAN_ALLOW_STATUS_FRAMES).unwrap(), PCAN_PARAMETER_ON);
    }

    #[test]
    fn test_unsupported_parameter() {
        let (_driver, mut bus) = open();
        let err = bus.get_parameter(PCAN_HARDWARE_NAME).unwrap_err();
        assert_eq!(err.status(), Some(Status::ILLPARAMTYPE));
    }

    #[test]
    fn test_get_string() {
        let (driver, mut bus) = open();
        driver.store_value(PCAN_USBBUS1, PCAN_HARDWARE_NAME, b"PCAN-USB FD\0junk");
        assert_eq!(bus.get_string(PCAN_HARDWARE_NAME).unwrap(), "PCAN-USB FD");
    }

    #[test]
    fn test_channel_condition() {
        let (driver, mut bus) = open();
        assert_eq!(bus.channel_condition().unwrap(), ChannelCondition::Unavailable);
        driver.set_condition(PCAN_USBBUS1, PCAN_CHANNEL_OCCUPIED);
        assert_eq!(bus.channel_condition().unwrap(), ChannelCondition::Occupied);
    }

    #[test]
    fn test_status_and_reset() {
        let (driver, mut bus) = open();
        assert_eq!(bus.status().unwrap(), Status::OK);

        driver.set_bus_status(Status::BUSOFF);
        assert_eq!(bus.status().unwrap(), Status::BUSOFF);

        driver.set_bus_status(Status::ILLHANDLE);
        assert_eq!(bus.status().unwrap_err().status(), Some(Status::ILLHANDLE));

        driver.push(&frame(0x1, 1));
        bus.reset().unwrap();
        assert_eq!(driver.pending(), 0);
    }
}
