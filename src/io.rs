//! 256-port I/O space.
//!
//! Real peripherals are entirely a host concern. The core only provides
//! the plumbing: a fixed table of 256 optional callback slots, one per
//! port number. An unbound port reads as 0 and silently discards writes.

use crate::error::CpuError;

/// Direction of an I/O access, passed to a port handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    Read,
    Write,
}

/// A host-supplied port handler.
///
/// Called synchronously from `execute()`. For `IoMode::Read`, `data` is
/// `0` and the return value is the byte delivered to the CPU. For
/// `IoMode::Write`, `data` is the byte being written and the return
/// value is ignored. Handlers must not re-enter the emulator.
pub type IoHandler = Box<dyn FnMut(IoMode, u8) -> Result<u8, CpuError>>;

/// The 256-slot port table.
pub struct IoPorts {
    handlers: Vec<Option<IoHandler>>,
}

impl IoPorts {
    pub fn new() -> Self {
        let mut handlers = Vec::with_capacity(256);
        handlers.resize_with(256, || None);
        Self { handlers }
    }

    /// Register (or replace) the handler for `port`.
    pub fn bind(&mut self, port: u8, handler: IoHandler) {
        self.handlers[port as usize] = Some(handler);
    }

    /// Remove any handler bound to `port`.
    pub fn unbind(&mut self, port: u8) {
        self.handlers[port as usize] = None;
    }

    /// Read a byte from `port`. Unbound ports read as 0.
    pub fn read(&mut self, port: u8) -> Result<u8, CpuError> {
        match &mut self.handlers[port as usize] {
            Some(handler) => handler(IoMode::Read, 0),
            None => Ok(0),
        }
    }

    /// Write `val` to `port`. Unbound ports drop the write.
    pub fn write(&mut self, port: u8, val: u8) -> Result<(), CpuError> {
        match &mut self.handlers[port as usize] {
            Some(handler) => handler(IoMode::Write, val).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Default for IoPorts {
    fn default() -> Self {
        Self::new()
    }
}
