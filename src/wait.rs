//! Receive notification
//!
//! A channel blocks between empty reads through a [`ReceiveWait`]. Which
//! variant is used is decided once per channel by [`detect`]:
//!
//! - Windows: an auto-reset event registered through `PCAN_RECEIVE_EVENT`
//! - Unix: the file descriptor the driver exposes through `PCAN_RECEIVE_EVENT`
//! - otherwise: short sleeps between polls

use std::time::Duration;

use log::debug;

use crate::driver::Driver;
use crate::error::Result;

/// Upper bound on one sleep of the polling fallback
pub const POLL_INTERVAL: Duration = Duration::from_micros(250);

/// Result of a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A frame may be available
    Ready,
    /// The timeout elapsed without notification
    TimedOut,
}

/// Blocks until the driver signals a received frame
pub trait ReceiveWait: Send {
    /// Wait at most `timeout`, or without limit if `None`
    ///
    /// Spurious [`WaitOutcome::Ready`] results are allowed; callers re-read.
    fn wait(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome>;

    /// Check if the wait is driven by driver notifications
    fn is_event_driven(&self) -> bool {
        false
    }

    /// Unregister from the driver and free the wait resource
    ///
    /// Called once, before the channel is uninitialized.
    fn release(&mut self, _driver: &dyn Driver, _channel: u16) -> Result<()> {
        Ok(())
    }
}

/// Polling fallback: sleeps for at most [`POLL_INTERVAL`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepWait;

impl ReceiveWait for SleepWait {
    fn wait(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let nap = timeout.map_or(POLL_INTERVAL, |t| t.min(POLL_INTERVAL));
        std::thread::sleep(nap);
        Ok(WaitOutcome::Ready)
    }
}

/// Pick the best wait primitive for `channel`
pub fn detect(driver: &dyn Driver, channel: u16) -> Box<dyn ReceiveWait> {
    #[cfg(windows)]
    {
        match event::EventWait::register(driver, channel) {
            Ok(Some(wait)) => {
                debug!("Channel 0x{:X}: using receive event", channel);
                return Box::new(wait);
            }
            Ok(None) => {}
            Err(e) => debug!("Channel 0x{:X}: receive event unavailable: {}", channel, e),
        }
    }

    #[cfg(unix)]
    {
        if let Some(wait) = fd::FdWait::query(driver, channel) {
            debug!("Channel 0x{:X}: polling receive descriptor {}", channel, wait.fd());
            return Box::new(wait);
        }
    }

    debug!("Channel 0x{:X}: falling back to sleep polling", channel);
    Box::new(SleepWait)
}

#[cfg(unix)]
pub use fd::FdWait;

#[cfg(unix)]
mod fd {
    use std::io;
    use std::os::raw::c_int;
    use std::time::Duration;

    use log::trace;

    use super::{ReceiveWait, WaitOutcome};
    use crate::constants::PCAN_RECEIVE_EVENT;
    use crate::driver::Driver;
    use crate::error::{PcanError, Result};

    /// Waits on the receive descriptor of a channel with `poll(2)`
    ///
    /// The descriptor belongs to the driver and is closed by it.
    #[derive(Debug)]
    pub struct FdWait {
        fd: c_int,
    }

    impl FdWait {
        /// Ask the driver for the channel's receive descriptor
        pub fn query(driver: &dyn Driver, channel: u16) -> Option<Self> {
            let mut buffer = [0u8; 4];
            match driver.get_value(channel, PCAN_RECEIVE_EVENT, &mut buffer) {
                Ok(status) if status.is_ok() => {}
                _ => return None,
            }
            let fd = c_int::from_ne_bytes(buffer);
            (fd >= 0).then_some(Self { fd })
        }

        /// The polled descriptor
        pub fn fd(&self) -> c_int {
            self.fd
        }
    }

    impl ReceiveWait for FdWait {
        fn wait(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome> {
            let timeout_ms = match timeout {
                // poll(2) takes whole milliseconds, rounded up
                Some(t) => c_int::try_from(t.as_micros().div_ceil(1000)).unwrap_or(c_int::MAX),
                None => -1,
            };
            let mut pfd = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };

            let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            trace!("poll(fd={}, {} ms) = {}", self.fd, timeout_ms, ret);
            match ret {
                0 => Ok(WaitOutcome::TimedOut),
                r if r > 0 => Ok(WaitOutcome::Ready),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        Ok(WaitOutcome::Ready)
                    } else {
                        Err(PcanError::Wait(err))
                    }
                }
            }
        }

        fn is_event_driven(&self) -> bool {
            true
        }
    }
}

#[cfg(windows)]
pub use event::EventWait;

#[cfg(windows)]
mod event {
    use std::io;
    use std::ptr;
    use std::time::Duration;

    use log::{trace, warn};
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT};
    use windows_sys::Win32::System::Threading::{CreateEventW, WaitForSingleObject, INFINITE};

    use super::{ReceiveWait, WaitOutcome};
    use crate::constants::PCAN_RECEIVE_EVENT;
    use crate::driver::Driver;
    use crate::error::{PcanError, Result};

    /// Auto-reset event the driver signals on every received frame
    #[derive(Debug)]
    pub struct EventWait {
        handle: HANDLE,
    }

    // The handle is a kernel object reference usable from any thread
    unsafe impl Send for EventWait {}

    impl EventWait {
        /// Create an event and register it for `channel`
        ///
        /// Returns `Ok(None)` when the driver refuses the registration.
        pub fn register(driver: &dyn Driver, channel: u16) -> Result<Option<Self>> {
            let handle = unsafe { CreateEventW(ptr::null(), 0, 0, ptr::null()) };
            if handle.is_null() {
                return Err(PcanError::Event(io::Error::last_os_error()));
            }
            let wait = Self { handle };

            let value = (handle as usize).to_ne_bytes();
            match driver.set_value(channel, PCAN_RECEIVE_EVENT, &value)? {
                status if status.is_ok() => Ok(Some(wait)),
                _ => Ok(None),
            }
        }
    }

    impl ReceiveWait for EventWait {
        fn wait(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome> {
            let timeout_ms = match timeout {
                Some(t) => u32::try_from(t.as_micros().div_ceil(1000))
                    .unwrap_or(INFINITE - 1)
                    .min(INFINITE - 1),
                None => INFINITE,
            };

            let ret = unsafe { WaitForSingleObject(self.handle, timeout_ms) };
            trace!("WaitForSingleObject({} ms) = 0x{:X}", timeout_ms, ret);
            match ret {
                WAIT_OBJECT_0 => Ok(WaitOutcome::Ready),
                WAIT_TIMEOUT => Ok(WaitOutcome::TimedOut),
                WAIT_FAILED => Err(PcanError::Wait(io::Error::last_os_error())),
                other => Err(PcanError::Wait(io::Error::other(format!(
                    "unexpected wait result 0x{:X}",
                    other
                )))),
            }
        }

        fn is_event_driven(&self) -> bool {
            true
        }

        fn release(&mut self, driver: &dyn Driver, channel: u16) -> Result<()> {
            if self.handle.is_null() {
                return Ok(());
            }
            let value = 0usize.to_ne_bytes();
            let result = driver.set_value(channel, PCAN_RECEIVE_EVENT, &value);
            unsafe { CloseHandle(self.handle) };
            self.handle = ptr::null_mut();
            result?.into_result()
        }
    }

    impl Drop for EventWait {
        fn drop(&mut self) {
            if !self.handle.is_null() && unsafe { CloseHandle(self.handle) } == 0 {
                warn!("Failed to close receive event: {}", io::Error::last_os_error());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::testing::StubDriver;

    #[test]
    fn test_sleep_wait_is_bounded_by_timeout() {
        let mut wait = SleepWait;
        let start = Instant::now();
        assert_eq!(wait.wait(Some(Duration::ZERO)).unwrap(), WaitOutcome::Ready);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_wait_is_bounded_by_interval() {
        let mut wait = SleepWait;
        let start = Instant::now();
        assert_eq!(wait.wait(None).unwrap(), WaitOutcome::Ready);
        let elapsed = start.elapsed();
        assert!(elapsed >= POLL_INTERVAL);
        assert!(elapsed < Duration::from_millis(50));
        assert!(!wait.is_event_driven());
    }

    #[test]
    fn test_detect_falls_back_without_driver_support() {
        let driver = StubDriver::new();
        let wait = detect(&driver, 0x51);
        assert!(!wait.is_event_driven());
    }

    #[cfg(unix)]
    #[test]
    fn test_fd_wait_times_out_and_wakes() {
        let mut fds = [0 as libc::c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let [read_fd, write_fd] = fds;

        let driver = StubDriver::new();
        driver.set_receive_fd(read_fd);
        let mut wait = FdWait::query(&driver, 0x51).unwrap();
        assert!(wait.is_event_driven());
        assert_eq!(wait.fd(), read_fd);

        let start = Instant::now();
        assert_eq!(
            wait.wait(Some(Duration::from_millis(20))).unwrap(),
            WaitOutcome::TimedOut
        );
        assert!(start.elapsed() >= Duration::from_millis(20));

        assert_eq!(unsafe { libc::write(write_fd, [1u8].as_ptr().cast(), 1) }, 1);
        assert_eq!(
            wait.wait(Some(Duration::from_secs(1))).unwrap(),
            WaitOutcome::Ready
        );

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }
}
