//! Z80 CPU test suite.
//!
//! - `instructions.rs`: per-family instruction tests (loads, ALU, rotates,
//!   jumps/calls, CB-page bit ops, ED-page extended ops, block ops).
//! - `fixtures.rs`: end-to-end decode+execute scenarios.
//!
//! # References
//! - Zilog Z80 CPU User Manual

use super::*;

mod fixtures;

/// Build a CPU with `bytes` loaded at address 0 and `PC` at 0.
fn cpu_with(bytes: &[u8]) -> Cpu {
    Cpu::new(Some(bytes))
}

/// Run one fetch/execute step, panicking with the given context on error.
fn step(cpu: &mut Cpu, context: &str) {
    cpu.fetch().unwrap_or_else(|e| panic!("{context}: fetch failed: {e}"));
    cpu.execute().unwrap_or_else(|e| panic!("{context}: execute failed: {e}"));
}

#[allow(dead_code)]
fn assert_flags(cpu: &Cpu, expected: u8, context: &str) {
    assert_eq!(
        cpu.f, expected,
        "{}: flags mismatch. Expected {:08b}, got {:08b} (S={} Z={} F5={} H={} F3={} PV={} N={} C={})",
        context,
        expected,
        cpu.f,
        if cpu.flag_s() { 1 } else { 0 },
        if cpu.flag_z() { 1 } else { 0 },
        if cpu.f & flags::F5 != 0 { 1 } else { 0 },
        if cpu.flag_h() { 1 } else { 0 },
        if cpu.f & flags::F3 != 0 { 1 } else { 0 },
        if cpu.flag_pv() { 1 } else { 0 },
        if cpu.flag_n() { 1 } else { 0 },
        if cpu.flag_c() { 1 } else { 0 },
    );
}
