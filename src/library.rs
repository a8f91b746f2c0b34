//! PCAN-Basic library loader
//!
//! [`PcanApi`] opens the platform's PCAN-Basic module at runtime, resolves all
//! entry points up front and forwards [`Driver`] calls to them. Loading is
//! explicit and idempotent; after [`PcanApi::unload`] every call fails with
//! [`PcanError::NotLoaded`].

use std::ffi::{c_char, c_void, CStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use libloading::{Library, Symbol};
use log::debug;

use crate::constants::MAX_LENGTH_STRING_BUFFER;
use crate::driver::Driver;
use crate::error::{PcanError, Result};
use crate::status::Status;
use crate::structures::{RawMessage, RawMessageFd, RawTimestamp};

/// Environment variable overriding the library path used by [`PcanApi::new`]
pub const PCAN_BASIC_LIBRARY_ENV: &str = "PCAN_BASIC_LIBRARY";

/// Default library name for this platform
#[cfg(windows)]
pub const DEFAULT_LIBRARY_NAME: &str = "PCANBasic.dll";
/// Default library name for this platform
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "libPCBUSB.dylib";
/// Default library name for this platform
#[cfg(all(unix, not(target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAME: &str = "libpcanbasic.so";

type InitializeFn = unsafe extern "system" fn(u16, u16, u8, u32, u16) -> u32;
type InitializeFdFn = unsafe extern "system" fn(u16, *const c_char) -> u32;
type ChannelFn = unsafe extern "system" fn(u16) -> u32;
type ReadFn = unsafe extern "system" fn(u16, *mut RawMessage, *mut RawTimestamp) -> u32;
type ReadFdFn = unsafe extern "system" fn(u16, *mut RawMessageFd, *mut u64) -> u32;
type WriteFn = unsafe extern "system" fn(u16, *const RawMessage) -> u32;
type WriteFdFn = unsafe extern "system" fn(u16, *const RawMessageFd) -> u32;
type FilterMessagesFn = unsafe extern "system" fn(u16, u32, u32, u8) -> u32;
type ValueFn = unsafe extern "system" fn(u16, u8, *mut c_void, u32) -> u32;
type GetErrorTextFn = unsafe extern "system" fn(u32, u16, *mut c_char) -> u32;
type LookUpChannelFn = unsafe extern "system" fn(*const c_char, *mut u16) -> u32;

/// Resolved entry points
///
/// The function pointers are only valid while `_library` is alive, which is
/// why it is the last field and never handed out.
struct EntryPoints {
    initialize: InitializeFn,
    initialize_fd: InitializeFdFn,
    uninitialize: ChannelFn,
    reset: ChannelFn,
    get_status: ChannelFn,
    read: ReadFn,
    read_fd: ReadFdFn,
    write: WriteFn,
    write_fd: WriteFdFn,
    filter_messages: FilterMessagesFn,
    get_value: ValueFn,
    set_value: ValueFn,
    get_error_text: GetErrorTextFn,
    lookup_channel: LookUpChannelFn,
    _library: Library,
}

impl EntryPoints {
    fn resolve(library: Library) -> Result<Self> {
        unsafe {
            Ok(Self {
                initialize: symbol(&library, "CAN_Initialize")?,
                initialize_fd: symbol(&library, "CAN_InitializeFD")?,
                uninitialize: symbol(&library, "CAN_Uninitialize")?,
                reset: symbol(&library, "CAN_Reset")?,
                get_status: symbol(&library, "CAN_GetStatus")?,
                read: symbol(&library, "CAN_Read")?,
                read_fd: symbol(&library, "CAN_ReadFD")?,
                write: symbol(&library, "CAN_Write")?,
                write_fd: symbol(&library, "CAN_WriteFD")?,
                filter_messages: symbol(&library, "CAN_FilterMessages")?,
                get_value: symbol(&library, "CAN_GetValue")?,
                set_value: symbol(&library, "CAN_SetValue")?,
                get_error_text: symbol(&library, "CAN_GetErrorText")?,
                lookup_channel: symbol(&library, "CAN_LookUpChannel")?,
                _library: library,
            })
        }
    }
}

/// Look up `name` and copy out the function pointer
///
/// # Safety
/// `T` must match the native signature of `name`.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    let symbol: Symbol<T> = library
        .get(name.as_bytes())
        .map_err(|source| PcanError::MissingEntryPoint { name, source })?;
    Ok(*symbol)
}

/// Handle to the native PCAN-Basic library
///
/// One `PcanApi` is usually shared between channels through an `Arc`.
pub struct PcanApi {
    path: PathBuf,
    entries: RwLock<Option<EntryPoints>>,
}

impl PcanApi {
    /// Create an unloaded handle for the default library
    ///
    /// The path comes from `PCAN_BASIC_LIBRARY` if set, otherwise
    /// [`DEFAULT_LIBRARY_NAME`] resolved through the system search path.
    pub fn new() -> Self {
        let path = std::env::var_os(PCAN_BASIC_LIBRARY_ENV)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| OsString::from(DEFAULT_LIBRARY_NAME));
        Self::with_path(path)
    }

    /// Create an unloaded handle for the library at `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(None),
        }
    }

    /// Create a handle for the default library and load it
    pub fn open() -> Result<Self> {
        let api = Self::new();
        api.load()?;
        Ok(api)
    }

    /// Library path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the library and resolve every entry point
    ///
    /// Does nothing if already loaded. A missing entry point fails the whole
    /// load and leaves the handle unloaded.
    pub fn load(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.is_some() {
            return Ok(());
        }

        let library = unsafe { Library::new(&self.path)? };
        *entries = Some(EntryPoints::resolve(library)?);
        debug!("Loaded PCAN-Basic library from {}", self.path.display());
        Ok(())
    }

    /// Release the library
    ///
    /// Waits for calls in flight on other threads to return.
    pub fn unload(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.take().is_some() {
            debug!("Unloaded PCAN-Basic library {}", self.path.display());
        }
    }

    /// Check if the library is loaded
    pub fn is_loaded(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn call(&self, f: impl FnOnce(&EntryPoints) -> u32) -> Result<Status> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let api = entries.as_ref().ok_or(PcanError::NotLoaded)?;
        Ok(Status(f(api)))
    }
}

impl Default for PcanApi {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PcanApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcanApi")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

fn buffer_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| PcanError::BufferTooLarge(len))
}

impl Driver for PcanApi {
    fn initialize(
        &self,
        channel: u16,
        btr0btr1: u16,
        hw_type: u8,
        io_port: u32,
        interrupt: u16,
    ) -> Result<Status> {
        self.call(|api| unsafe { (api.initialize)(channel, btr0btr1, hw_type, io_port, interrupt) })
    }

    fn initialize_fd(&self, channel: u16, bitrate: &CStr) -> Result<Status> {
        self.call(|api| unsafe { (api.initialize_fd)(channel, bitrate.as_ptr()) })
    }

    fn uninitialize(&self, channel: u16) -> Result<Status> {
        self.call(|api| unsafe { (api.uninitialize)(channel) })
    }

    fn reset(&self, channel: u16) -> Result<Status> {
        self.call(|api| unsafe { (api.reset)(channel) })
    }

    fn get_status(&self, channel: u16) -> Result<Status> {
        self.call(|api| unsafe { (api.get_status)(channel) })
    }

    fn read(
        &self,
        channel: u16,
        message: &mut RawMessage,
        timestamp: &mut RawTimestamp,
    ) -> Result<Status> {
        self.call(|api| unsafe { (api.read)(channel, message, timestamp) })
    }

    fn read_fd(
        &self,
        channel: u16,
        message: &mut RawMessageFd,
        timestamp: &mut u64,
    ) -> Result<Status> {
        self.call(|api| unsafe { (api.read_fd)(channel, message, timestamp) })
    }

    fn write(&self, channel: u16, message: &RawMessage) -> Result<Status> {
        self.call(|api| unsafe { (api.write)(channel, message) })
    }

    fn write_fd(&self, channel: u16, message: &RawMessageFd) -> Result<Status> {
        self.call(|api| unsafe { (api.write_fd)(channel, message) })
    }

    fn filter_messages(&self, channel: u16, from: u32, to: u32, mode: u8) -> Result<Status> {
        self.call(|api| unsafe { (api.filter_messages)(channel, from, to, mode) })
    }

    fn get_value(&self, channel: u16, parameter: u8, buffer: &mut [u8]) -> Result<Status> {
        let len = buffer_len(buffer.len())?;
        self.call(|api| unsafe {
            (api.get_value)(channel, parameter, buffer.as_mut_ptr().cast(), len)
        })
    }

    fn set_value(&self, channel: u16, parameter: u8, buffer: &[u8]) -> Result<Status> {
        let len = buffer_len(buffer.len())?;
        // CAN_SetValue only reads through the pointer
        self.call(|api| unsafe {
            (api.set_value)(channel, parameter, buffer.as_ptr() as *mut c_void, len)
        })
    }

    fn get_error_text(
        &self,
        status: Status,
        language: u16,
        buffer: &mut [u8; MAX_LENGTH_STRING_BUFFER],
    ) -> Result<Status> {
        self.call(|api| unsafe {
            (api.get_error_text)(status.code(), language, buffer.as_mut_ptr().cast())
        })
    }

    fn lookup_channel(&self, parameters: &CStr, found: &mut u16) -> Result<Status> {
        self.call(|api| unsafe { (api.lookup_channel)(parameters.as_ptr(), found) })
    }
}
