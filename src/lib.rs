//! Zilog Z80 instruction-set emulator core.
//!
//! Platform-agnostic: no OS APIs, no host I/O beyond the explicit
//! [`io::IoPorts`] callback table. A [`cpu::Cpu`] owns its own flat 64 KiB
//! address space and steps one instruction at a time via
//! [`cpu::Cpu::fetch`] / [`cpu::Cpu::execute`].
//!
//! # Module organization
//!
//! - `error`: the [`error::CpuError`] type and decoder path formatting.
//! - `memory`: the flat 64 KiB address space.
//! - `io`: the 256-port I/O callback table.
//! - `cpu`: registers, decode, and instruction execution.

pub mod cpu;
pub mod error;
pub mod io;
pub mod memory;

pub use cpu::{Cpu, Registers};
pub use error::{call_chain_to_hex, CpuError};
pub use io::{IoHandler, IoMode, IoPorts};
pub use memory::Memory;
