//! Zilog Z80 CPU core.
//!
//! # Module organization
//!
//! - `flags`: flag bit constants and the precomputed S/Z/F5/F3/parity and
//!   half-carry/overflow lookup tables.
//! - `helpers`: register/flag accessors, ALU primitives, instruction
//!   fetch, and stack operations.
//! - `decode`: the prefix-tree decoder that turns a byte stream into a
//!   prepared instruction.
//! - `execute`: the opcode family dispatch that consumes a prepared
//!   instruction.
//!
//! # Register set
//!
//! All registers are plain 16-bit values; there is no extended
//! addressing mode. `AF'`/`BC'`/`DE'`/`HL'` are storage-only shadow
//! registers, reachable solely through `EX AF,AF'` and `EXX`.

use crate::error::CpuError;
use crate::io::{IoHandler, IoPorts};
use crate::memory::Memory;

mod decode;
mod execute;
pub mod flags;
mod helpers;

#[cfg(test)]
mod tests;

pub use decode::Prepared;

/// A snapshot of the architectural register file, as returned by
/// [`Cpu::get_registers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub pc: u16,
    pub sp: u16,
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub ix: u16,
    pub iy: u16,
    pub af_shadow: u16,
    pub bc_shadow: u16,
    pub de_shadow: u16,
    pub hl_shadow: u16,
    pub i: u8,
    pub r: u8,
    pub im: u8,
}

/// Serialized size of [`Cpu::to_bytes`] / [`Cpu::from_bytes`].
pub const SNAPSHOT_SIZE: usize = 27 + crate::memory::SIZE;

/// The Z80 CPU: registers, memory, I/O ports, and the fetch/execute step
/// driver.
pub struct Cpu {
    pub(crate) a: u8,
    pub(crate) f: u8,
    pub(crate) bc: u16,
    pub(crate) de: u16,
    pub(crate) hl: u16,

    pub(crate) a_prime: u8,
    pub(crate) f_prime: u8,
    pub(crate) bc_prime: u16,
    pub(crate) de_prime: u16,
    pub(crate) hl_prime: u16,

    pub(crate) ix: u16,
    pub(crate) iy: u16,

    pub(crate) sp: u16,
    pub(crate) pc: u16,
    pub(crate) i: u8,
    pub(crate) r: u8,

    pub(crate) iff1: bool,
    pub(crate) iff2: bool,
    pub(crate) im: u8,
    pub(crate) halted: bool,

    /// Set to 1 by `EI`, decremented each `execute()`; IFF1/IFF2 flip to
    /// true when it reaches 0. Models the real Z80's one-instruction EI
    /// delay (see DESIGN.md Open Questions).
    pub(crate) ei_delay: u8,

    pub(crate) memory: Memory,
    pub(crate) io: IoPorts,

    prepared: Option<Prepared>,
}

impl Cpu {
    /// Construct a CPU with an optional initial 64 KiB memory image.
    /// Registers start in the documented Z80 power-on state.
    pub fn new(image: Option<&[u8]>) -> Self {
        let memory = match image {
            Some(bytes) => Memory::from_image(bytes),
            None => Memory::new(),
        };
        Self {
            a: 0xFF,
            f: 0xFF,
            bc: 0,
            de: 0,
            hl: 0,
            a_prime: 0xFF,
            f_prime: 0xFF,
            bc_prime: 0,
            de_prime: 0,
            hl_prime: 0,
            ix: 0,
            iy: 0,
            sp: 0xFFFF,
            pc: 0,
            i: 0,
            r: 0,
            iff1: true,
            iff2: true,
            im: 0,
            halted: false,
            ei_delay: 0,
            memory,
            io: IoPorts::new(),
            prepared: None,
        }
    }

    /// Reset to the documented power-on state, keeping the current
    /// memory image and I/O bindings.
    pub fn reset(&mut self) {
        self.a = 0xFF;
        self.f = 0xFF;
        self.bc = 0;
        self.de = 0;
        self.hl = 0;
        self.a_prime = 0xFF;
        self.f_prime = 0xFF;
        self.bc_prime = 0;
        self.de_prime = 0;
        self.hl_prime = 0;
        self.ix = 0;
        self.iy = 0;
        self.sp = 0xFFFF;
        self.pc = 0;
        self.i = 0;
        self.r = 0;
        self.iff1 = true;
        self.iff2 = true;
        self.im = 0;
        self.halted = false;
        self.ei_delay = 0;
        self.prepared = None;
    }

    /// Decode the instruction at `PC` into a prepared instruction.
    /// Advances `PC` and `R` past the bytes consumed. Fails with
    /// [`CpuError::InvalidOpcode`] on an empty/out-of-range decoder slot.
    pub fn fetch(&mut self) -> Result<(), CpuError> {
        let prepared = decode::decode(self)?;
        self.prepared = Some(prepared);
        Ok(())
    }

    /// Execute the instruction prepared by the preceding `fetch()`.
    /// Fails with [`CpuError::NotFetched`] if `fetch()` was not called
    /// first, with [`CpuError::CpuHalted`] if the instruction was
    /// `HALT`, or with [`CpuError::IoCallbackError`] if a host I/O
    /// handler failed.
    pub fn execute(&mut self) -> Result<(), CpuError> {
        let prepared = self.prepared.take().ok_or(CpuError::NotFetched)?;

        if self.ei_delay > 0 {
            self.ei_delay -= 1;
            if self.ei_delay == 0 {
                self.iff1 = true;
                self.iff2 = true;
            }
        }

        if prepared.page == decode::Page::Base && prepared.opcode == 0x76 {
            // HALT references no HL operand, so a DD/FD prefix ahead of it
            // is a wasted prefix: DD 76 / FD 76 still halt.
            self.halted = true;
            log::debug!("cpu halted at pc={:#06x}", self.pc);
            return Err(CpuError::CpuHalted);
        }

        execute::execute(self, &prepared)
    }

    /// Snapshot the register file.
    pub fn get_registers(&self) -> Registers {
        Registers {
            pc: self.pc,
            sp: self.sp,
            af: ((self.a as u16) << 8) | self.f as u16,
            bc: self.bc,
            de: self.de,
            hl: self.hl,
            ix: self.ix,
            iy: self.iy,
            af_shadow: ((self.a_prime as u16) << 8) | self.f_prime as u16,
            bc_shadow: self.bc_prime,
            de_shadow: self.de_prime,
            hl_shadow: self.hl_prime,
            i: self.i,
            r: self.r,
            im: self.im,
        }
    }

    /// The maskable-interrupt enable latch (`IFF1`).
    pub fn get_interrupt_state(&self) -> bool {
        self.iff1
    }

    /// Bind (or replace) the handler for a single I/O port.
    pub fn add_io_handler(&mut self, port: u8, handler: IoHandler) {
        self.io.bind(port, handler);
    }

    /// Direct memory read, bypassing the CPU (e.g. for host-side
    /// inspection or loading data after construction).
    pub fn peek(&self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    /// Direct memory write, bypassing the CPU.
    pub fn poke(&mut self, addr: u16, val: u8) {
        self.memory.write(addr, val);
    }

    #[cfg(test)]
    pub(crate) fn peek_prepared(&self) -> &Prepared {
        self.prepared.as_ref().expect("fetch() was not called")
    }

    /// Serialize register file and memory image for snapshot persistence.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SNAPSHOT_SIZE);
        buf.push(self.a);
        buf.push(self.f);
        buf.extend_from_slice(&self.bc.to_le_bytes());
        buf.extend_from_slice(&self.de.to_le_bytes());
        buf.extend_from_slice(&self.hl.to_le_bytes());
        buf.push(self.a_prime);
        buf.push(self.f_prime);
        buf.extend_from_slice(&self.bc_prime.to_le_bytes());
        buf.extend_from_slice(&self.de_prime.to_le_bytes());
        buf.extend_from_slice(&self.hl_prime.to_le_bytes());
        buf.extend_from_slice(&self.ix.to_le_bytes());
        buf.extend_from_slice(&self.iy.to_le_bytes());
        buf.extend_from_slice(&self.sp.to_le_bytes());
        buf.extend_from_slice(&self.pc.to_le_bytes());
        buf.push(self.i);
        buf.push(self.r);
        buf.push(self.im);
        let mut flags = 0u8;
        if self.iff1 {
            flags |= 1 << 0;
        }
        if self.iff2 {
            flags |= 1 << 1;
        }
        if self.halted {
            flags |= 1 << 2;
        }
        buf.push(flags);
        buf.push(self.ei_delay);
        buf.extend_from_slice(self.memory.as_bytes());
        buf
    }

    /// Restore register file and memory image from a buffer produced by
    /// [`Cpu::to_bytes`]. Fails rather than panicking on a malformed
    /// (too-short) buffer.
    pub fn from_bytes(&mut self, buf: &[u8]) -> Result<(), CpuError> {
        if buf.len() < SNAPSHOT_SIZE {
            return Err(CpuError::io_callback(crate::error::IoError(format!(
                "snapshot buffer too small: got {} bytes, need {}",
                buf.len(),
                SNAPSHOT_SIZE
            ))));
        }
        let mut pos = 0usize;
        let take2 = |buf: &[u8], pos: &mut usize| -> u16 {
            let v = u16::from_le_bytes([buf[*pos], buf[*pos + 1]]);
            *pos += 2;
            v
        };

        self.a = buf[pos];
        pos += 1;
        self.f = buf[pos];
        pos += 1;
        self.bc = take2(buf, &mut pos);
        self.de = take2(buf, &mut pos);
        self.hl = take2(buf, &mut pos);
        self.a_prime = buf[pos];
        pos += 1;
        self.f_prime = buf[pos];
        pos += 1;
        self.bc_prime = take2(buf, &mut pos);
        self.de_prime = take2(buf, &mut pos);
        self.hl_prime = take2(buf, &mut pos);
        self.ix = take2(buf, &mut pos);
        self.iy = take2(buf, &mut pos);
        self.sp = take2(buf, &mut pos);
        self.pc = take2(buf, &mut pos);
        self.i = buf[pos];
        pos += 1;
        self.r = buf[pos];
        pos += 1;
        self.im = buf[pos];
        pos += 1;
        let flags = buf[pos];
        pos += 1;
        self.iff1 = flags & (1 << 0) != 0;
        self.iff2 = flags & (1 << 1) != 0;
        self.halted = flags & (1 << 2) != 0;
        self.ei_delay = buf[pos];
        pos += 1;

        let mem_bytes: &[u8; crate::memory::SIZE] = buf[pos..pos + crate::memory::SIZE]
            .try_into()
            .expect("slice length checked against SNAPSHOT_SIZE above");
        self.memory.load_bytes(mem_bytes);
        self.prepared = None;

        Ok(())
    }
}
