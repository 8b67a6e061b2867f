//! Opcode family dispatch.
//!
//! Instructions are decomposed the classic way — `x = op>>6`, `y =
//! (op>>3)&7`, `z = op&7`, `p = y>>1`, `q = y&1` — rather than spelled out
//! as 256-entry function-pointer tables per prefix page. `DD`/`FD`
//! prefixes are not separate tables at all: the decoder threads an
//! [`IndexMode`] through to register/memory resolution (see
//! `helpers::get_reg8`/`get_rp`), so the base-table handlers below serve
//! both the unprefixed and indexed forms of every instruction that can
//! be indexed.

use super::decode::{Page, Prepared};
use super::helpers::IndexMode;
use super::Cpu;
use crate::error::CpuError;
use crate::io::IoMode;

pub(super) fn execute(cpu: &mut Cpu, prepared: &Prepared) -> Result<(), CpuError> {
    match prepared.page {
        Page::Base => execute_base(cpu, prepared.opcode, prepared.index),
        Page::Cb => execute_cb(cpu, prepared.opcode, prepared.index, prepared.displacement),
        Page::Ed => execute_ed(cpu, prepared.opcode),
    }
}

/// Fetch the displacement byte for an `(IX+d)`/`(IY+d)` base-table
/// operand, but only when `reg_idx` actually names that slot (6) and a
/// prefix is in effect. Every other combination of prefix + operand
/// consumes no extra byte — the classic "wasted DD/FD prefix" case.
fn maybe_fetch_displacement(cpu: &mut Cpu, index: IndexMode, reg_idx: u8) -> Option<i8> {
    if index != IndexMode::None && reg_idx == 6 {
        Some(cpu.fetch_displacement())
    } else {
        None
    }
}

fn execute_base(cpu: &mut Cpu, opcode: u8, index: IndexMode) -> Result<(), CpuError> {
    let x = (opcode >> 6) & 0x03;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = (y >> 1) & 0x03;
    let q = y & 0x01;

    match x {
        0 => execute_x0(cpu, y, z, p, q, index),
        1 => {
            // LD r,r' (HALT, the y==6&&z==6 case, is intercepted before
            // execute() is ever called). When one operand is (HL) turned
            // (IX+d)/(IY+d) by a prefix, the other register operand is
            // NOT index-substituted -- only the memory reference is.
            if z == 6 {
                let disp = maybe_fetch_displacement(cpu, index, z);
                let val = cpu.get_reg8(z, index, disp);
                cpu.set_reg8(y, val, IndexMode::None, None);
            } else if y == 6 {
                let disp = maybe_fetch_displacement(cpu, index, y);
                let val = cpu.get_reg8(z, IndexMode::None, None);
                cpu.set_reg8(y, val, index, disp);
            } else {
                let val = cpu.get_reg8(z, index, None);
                cpu.set_reg8(y, val, index, None);
            }
            Ok(())
        }
        2 => {
            let disp = maybe_fetch_displacement(cpu, index, z);
            let val = cpu.get_reg8(z, index, disp);
            execute_alu(cpu, y, val);
            Ok(())
        }
        3 => execute_x3(cpu, y, z, p, q, index),
        _ => unreachable!("x is a 2-bit field"),
    }
}

fn execute_x0(cpu: &mut Cpu, y: u8, z: u8, p: u8, q: u8, index: IndexMode) -> Result<(), CpuError> {
    match z {
        0 => match y {
            0 => Ok(()), // NOP
            1 => {
                cpu.ex_af();
                Ok(())
            }
            2 => {
                // DJNZ d
                let d = cpu.fetch_byte() as i8;
                cpu.set_b(cpu.b().wrapping_sub(1));
                if cpu.b() != 0 {
                    cpu.pc = cpu.pc.wrapping_add(d as i16 as u16);
                }
                Ok(())
            }
            3 => {
                // JR d
                let d = cpu.fetch_byte() as i8;
                cpu.pc = cpu.pc.wrapping_add(d as i16 as u16);
                Ok(())
            }
            _ => {
                // JR cc,d for cc in {NZ,Z,NC,C} (y=4..7)
                let d = cpu.fetch_byte() as i8;
                if cpu.check_cc(y - 4) {
                    cpu.pc = cpu.pc.wrapping_add(d as i16 as u16);
                }
                Ok(())
            }
        },
        1 => {
            if q == 0 {
                let nn = cpu.fetch_word();
                cpu.set_rp(p, nn, index);
            } else {
                let rp = cpu.get_rp(p, index);
                let hl = cpu.get_rp(2, index);
                let result = cpu.add16(hl, rp);
                cpu.set_rp(2, result, index);
            }
            Ok(())
        }
        2 => {
            match (p, q) {
                (0, 0) => cpu.memory.write(cpu.bc, cpu.a), // LD (BC),A
                (0, 1) => cpu.a = cpu.memory.read(cpu.bc), // LD A,(BC)
                (1, 0) => cpu.memory.write(cpu.de, cpu.a), // LD (DE),A
                (1, 1) => cpu.a = cpu.memory.read(cpu.de), // LD A,(DE)
                (2, 0) => {
                    // LD (nn),HL/IX/IY
                    let addr = cpu.fetch_word();
                    let val = cpu.get_rp(2, index);
                    cpu.memory.write(addr, val as u8);
                    cpu.memory.write(addr.wrapping_add(1), (val >> 8) as u8);
                }
                (2, 1) => {
                    // LD HL/IX/IY,(nn)
                    let addr = cpu.fetch_word();
                    let lo = cpu.memory.read(addr) as u16;
                    let hi = cpu.memory.read(addr.wrapping_add(1)) as u16;
                    cpu.set_rp(2, lo | (hi << 8), index);
                }
                (3, 0) => {
                    // LD (nn),A
                    let addr = cpu.fetch_word();
                    cpu.memory.write(addr, cpu.a);
                }
                (3, 1) => {
                    // LD A,(nn)
                    let addr = cpu.fetch_word();
                    cpu.a = cpu.memory.read(addr);
                }
                _ => unreachable!("p is a 2-bit field"),
            }
            Ok(())
        }
        3 => {
            let rp = cpu.get_rp(p, index);
            if q == 0 {
                cpu.set_rp(p, rp.wrapping_add(1), index);
            } else {
                cpu.set_rp(p, rp.wrapping_sub(1), index);
            }
            Ok(())
        }
        4 => {
            let disp = maybe_fetch_displacement(cpu, index, y);
            let val = cpu.get_reg8(y, index, disp);
            let result = cpu.inc8(val);
            cpu.set_reg8(y, result, index, disp);
            Ok(())
        }
        5 => {
            let disp = maybe_fetch_displacement(cpu, index, y);
            let val = cpu.get_reg8(y, index, disp);
            let result = cpu.dec8(val);
            cpu.set_reg8(y, result, index, disp);
            Ok(())
        }
        6 => {
            let disp = maybe_fetch_displacement(cpu, index, y);
            let n = cpu.fetch_byte();
            cpu.set_reg8(y, n, index, disp);
            Ok(())
        }
        7 => {
            match y {
                0 => {
                    // RLCA
                    let carry = cpu.a >> 7;
                    cpu.a = (cpu.a << 1) | carry;
                    finish_rotate_a(cpu, carry != 0);
                }
                1 => {
                    // RRCA
                    let carry = cpu.a & 1;
                    cpu.a = (cpu.a >> 1) | (carry << 7);
                    finish_rotate_a(cpu, carry != 0);
                }
                2 => {
                    // RLA
                    let old_carry = cpu.flag_c() as u8;
                    let new_carry = cpu.a >> 7;
                    cpu.a = (cpu.a << 1) | old_carry;
                    finish_rotate_a(cpu, new_carry != 0);
                }
                3 => {
                    // RRA
                    let old_carry = cpu.flag_c() as u8;
                    let new_carry = cpu.a & 1;
                    cpu.a = (cpu.a >> 1) | (old_carry << 7);
                    finish_rotate_a(cpu, new_carry != 0);
                }
                4 => daa(cpu),
                5 => {
                    // CPL
                    cpu.a = !cpu.a;
                    cpu.set_flag_h(true);
                    cpu.set_flag_n(true);
                    cpu.f = (cpu.f & !(crate::cpu::flags::F3 | crate::cpu::flags::F5))
                        | (cpu.a & (crate::cpu::flags::F3 | crate::cpu::flags::F5));
                }
                6 => {
                    // SCF
                    cpu.set_flag_c(true);
                    cpu.set_flag_h(false);
                    cpu.set_flag_n(false);
                    cpu.f = (cpu.f & !(crate::cpu::flags::F3 | crate::cpu::flags::F5))
                        | (cpu.a & (crate::cpu::flags::F3 | crate::cpu::flags::F5));
                }
                7 => {
                    // CCF
                    let old_carry = cpu.flag_c();
                    cpu.set_flag_h(old_carry);
                    cpu.set_flag_c(!old_carry);
                    cpu.set_flag_n(false);
                    cpu.f = (cpu.f & !(crate::cpu::flags::F3 | crate::cpu::flags::F5))
                        | (cpu.a & (crate::cpu::flags::F3 | crate::cpu::flags::F5));
                }
                _ => unreachable!("y is a 3-bit field"),
            }
            Ok(())
        }
        _ => unreachable!("z is a 3-bit field"),
    }
}

fn finish_rotate_a(cpu: &mut Cpu, carry: bool) {
    cpu.set_flag_c(carry);
    cpu.set_flag_h(false);
    cpu.set_flag_n(false);
    cpu.f = (cpu.f & !(crate::cpu::flags::F3 | crate::cpu::flags::F5))
        | (cpu.a & (crate::cpu::flags::F3 | crate::cpu::flags::F5));
}

fn execute_alu(cpu: &mut Cpu, y: u8, val: u8) {
    match y {
        0 => cpu.a = cpu.add8(cpu.a, val, false),
        1 => cpu.a = cpu.add8(cpu.a, val, cpu.flag_c()),
        2 => cpu.a = cpu.sub8(cpu.a, val, false),
        3 => cpu.a = cpu.sub8(cpu.a, val, cpu.flag_c()),
        4 => cpu.a = cpu.and8(cpu.a, val),
        5 => cpu.a = cpu.xor8(cpu.a, val),
        6 => cpu.a = cpu.or8(cpu.a, val),
        7 => cpu.cp8(cpu.a, val),
        _ => unreachable!("y is a 3-bit field"),
    }
}

/// `DAA` — BCD-adjust `A` after an 8-bit addition or subtraction.
fn daa(cpu: &mut Cpu) {
    let old_a = cpu.a;
    let old_c = cpu.flag_c();
    let old_h = cpu.flag_h();
    let subtract = cpu.flag_n();

    let mut correction = 0u8;
    let mut carry_out = old_c;

    if old_h || (old_a & 0x0F) > 9 {
        correction |= 0x06;
    }
    if old_c || old_a > 0x99 {
        correction |= 0x60;
        carry_out = true;
    }

    if subtract {
        cpu.a = cpu.a.wrapping_sub(correction);
        cpu.set_flag_h(old_h && (old_a & 0x0F) < 6);
    } else {
        cpu.a = cpu.a.wrapping_add(correction);
        cpu.set_flag_h((old_a & 0x0F) + (correction & 0x0F) > 0x0F);
    }

    cpu.set_sz53(cpu.a);
    cpu.set_flag_pv(crate::cpu::flags::PARITY[cpu.a as usize] != 0);
    cpu.set_flag_c(carry_out);
}

fn execute_x3(cpu: &mut Cpu, y: u8, z: u8, p: u8, q: u8, index: IndexMode) -> Result<(), CpuError> {
    match z {
        0 => {
            // RET cc
            if cpu.check_cc(y) {
                cpu.pc = cpu.pop_word();
            }
            Ok(())
        }
        1 => {
            if q == 0 {
                let val = cpu.pop_word();
                cpu.set_rp2(p, val, index);
            } else {
                match p {
                    0 => cpu.pc = cpu.pop_word(), // RET
                    1 => cpu.exx(),
                    2 => cpu.pc = cpu.get_rp(2, index), // JP (HL)/(IX)/(IY)
                    3 => cpu.sp = cpu.get_rp(2, index), // LD SP,HL/IX/IY
                    _ => unreachable!("p is a 2-bit field"),
                }
            }
            Ok(())
        }
        2 => {
            // JP cc,nn
            let nn = cpu.fetch_word();
            if cpu.check_cc(y) {
                cpu.pc = nn;
            }
            Ok(())
        }
        3 => match y {
            0 => {
                cpu.pc = cpu.fetch_word();
                Ok(())
            }
            1 => {
                unreachable!("CB prefix is consumed by the decoder, not dispatched here")
            }
            2 => {
                let n = cpu.fetch_byte();
                let port = n;
                io_write(cpu, port, cpu.a)
            }
            3 => {
                let n = cpu.fetch_byte();
                cpu.a = io_read(cpu, n)?;
                Ok(())
            }
            4 => {
                // EX (SP),HL/IX/IY
                let lo = cpu.memory.read(cpu.sp) as u16;
                let hi = cpu.memory.read(cpu.sp.wrapping_add(1)) as u16;
                let sp_val = lo | (hi << 8);
                let rp = cpu.get_rp(2, index);
                cpu.memory.write(cpu.sp, rp as u8);
                cpu.memory.write(cpu.sp.wrapping_add(1), (rp >> 8) as u8);
                cpu.set_rp(2, sp_val, index);
                Ok(())
            }
            5 => {
                cpu.ex_de_hl();
                Ok(())
            }
            6 => {
                cpu.iff1 = false;
                cpu.iff2 = false;
                cpu.ei_delay = 0;
                Ok(())
            }
            7 => {
                // One full instruction of delay: IFF1/IFF2 flip true at
                // the start of the execute() call following the next one.
                cpu.ei_delay = 1;
                Ok(())
            }
            _ => unreachable!("y is a 3-bit field"),
        },
        4 => {
            // CALL cc,nn
            let nn = cpu.fetch_word();
            if cpu.check_cc(y) {
                cpu.push_word(cpu.pc);
                cpu.pc = nn;
            }
            Ok(())
        }
        5 => {
            if q == 0 {
                let val = cpu.get_rp2(p, index);
                cpu.push_word(val);
            } else if p == 0 {
                let nn = cpu.fetch_word();
                cpu.push_word(cpu.pc);
                cpu.pc = nn;
            }
            // p=1,2,3 at q=1 (DD/FD/ED prefixes) never reach here: the
            // decoder consumes those bytes itself.
            Ok(())
        }
        6 => {
            let n = cpu.fetch_byte();
            execute_alu(cpu, y, n);
            Ok(())
        }
        7 => {
            // RST y*8
            cpu.push_word(cpu.pc);
            cpu.pc = (y as u16) * 8;
            Ok(())
        }
        _ => unreachable!("z is a 3-bit field"),
    }
}

fn io_read(cpu: &mut Cpu, port: u8) -> Result<u8, CpuError> {
    cpu.io.read(port)
}

fn io_write(cpu: &mut Cpu, port: u8, val: u8) -> Result<(), CpuError> {
    cpu.io.write(port, val)
}

// ========== CB-prefixed rotate/shift/bit page ==========

fn execute_cb(cpu: &mut Cpu, opcode: u8, index: IndexMode, displacement: Option<i8>) -> Result<(), CpuError> {
    let x = (opcode >> 6) & 0x03;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;

    if index != IndexMode::None {
        // DD CB d op / FD CB d op: the operand is always (IX+d)/(IY+d).
        // If z != 6, the result is also copied into the named 8-bit
        // register (an undocumented but well-documented-as-undocumented
        // side effect of the indexed CB table).
        let addr = cpu.indexed_addr(index, displacement);
        let val = cpu.memory.read(addr);
        let result = match x {
            0 => rotate_shift(cpu, y, val),
            1 => {
                test_bit(cpu, y, val, (addr >> 8) as u8);
                val
            }
            2 => val & !(1 << y),
            3 => val | (1 << y),
            _ => unreachable!("x is a 2-bit field"),
        };
        if x != 1 {
            cpu.memory.write(addr, result);
            if z != 6 {
                cpu.set_reg8(z, result, IndexMode::None, None);
            }
        }
        return Ok(());
    }

    let val = cpu.get_reg8(z, IndexMode::None, None);
    match x {
        0 => {
            let result = rotate_shift(cpu, y, val);
            cpu.set_reg8(z, result, IndexMode::None, None);
        }
        1 => {
            let undoc_source = if z == 6 { (cpu.hl >> 8) as u8 } else { val };
            test_bit(cpu, y, val, undoc_source);
        }
        2 => {
            let result = val & !(1 << y);
            cpu.set_reg8(z, result, IndexMode::None, None);
        }
        3 => {
            let result = val | (1 << y);
            cpu.set_reg8(z, result, IndexMode::None, None);
        }
        _ => unreachable!("x is a 2-bit field"),
    }
    Ok(())
}

/// `RLC`/`RRC`/`RL`/`RR`/`SLA`/`SRA`/`SLL`/`SRL` (`y` selects which).
/// `SLL` is the undocumented shift-left-with-set-bit-0 variant.
fn rotate_shift(cpu: &mut Cpu, y: u8, val: u8) -> u8 {
    let (result, carry) = match y {
        0 => (val.rotate_left(1), val & 0x80 != 0),
        1 => (val.rotate_right(1), val & 0x01 != 0),
        2 => {
            let c = cpu.flag_c() as u8;
            ((val << 1) | c, val & 0x80 != 0)
        }
        3 => {
            let c = cpu.flag_c() as u8;
            ((val >> 1) | (c << 7), val & 0x01 != 0)
        }
        4 => (val << 1, val & 0x80 != 0),
        5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
        6 => ((val << 1) | 1, val & 0x80 != 0),
        7 => (val >> 1, val & 0x01 != 0),
        _ => unreachable!("y is a 3-bit field"),
    };
    cpu.f = crate::cpu::flags::SZ53P[result as usize];
    cpu.set_flag_c(carry);
    result
}

/// `BIT b,operand`. `undoc_source` supplies the byte F3/F5 are copied
/// from: the tested value itself for a register operand, or the high
/// byte of the effective address for an `(HL)`/`(IX+d)`/`(IY+d)` operand.
fn test_bit(cpu: &mut Cpu, bit: u8, val: u8, undoc_source: u8) {
    let set = val & (1 << bit) != 0;
    let preserved = cpu.f & crate::cpu::flags::C;
    let mut f = preserved | crate::cpu::flags::H;
    if !set {
        f |= crate::cpu::flags::Z | crate::cpu::flags::PV;
    }
    if bit == 7 && set {
        f |= crate::cpu::flags::S;
    }
    f |= undoc_source & (crate::cpu::flags::F3 | crate::cpu::flags::F5);
    cpu.f = f;
}

// ========== ED-prefixed extended instruction page ==========

pub(super) fn is_valid_ed_opcode(op: u8) -> bool {
    let x = (op >> 6) & 0x03;
    let y = (op >> 3) & 0x07;
    let z = op & 0x07;
    match x {
        1 => !(z == 7 && y >= 6),
        2 => y >= 4 && z <= 3,
        _ => false,
    }
}

fn execute_ed(cpu: &mut Cpu, opcode: u8) -> Result<(), CpuError> {
    let x = (opcode >> 6) & 0x03;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = (y >> 1) & 0x03;
    let q = y & 0x01;

    match x {
        1 => match z {
            0 => {
                // IN r,(C) / undocumented IN (C) for y==6
                let val = io_read(cpu, cpu.c())?;
                cpu.f = (cpu.f & crate::cpu::flags::C) | crate::cpu::flags::SZ53P[val as usize];
                if y != 6 {
                    cpu.set_reg8(y, val, IndexMode::None, None);
                }
                Ok(())
            }
            1 => {
                // OUT (C),r / undocumented OUT (C),0 for y==6
                let val = if y == 6 { 0 } else { cpu.get_reg8(y, IndexMode::None, None) };
                io_write(cpu, cpu.c(), val)
            }
            2 => {
                let rp = cpu.get_rp(p, IndexMode::None);
                let hl = cpu.hl;
                cpu.hl = if q == 0 {
                    cpu.sbc16(hl, rp, cpu.flag_c())
                } else {
                    cpu.adc16(hl, rp, cpu.flag_c())
                };
                Ok(())
            }
            3 => {
                let addr = cpu.fetch_word();
                if q == 0 {
                    let rp = cpu.get_rp(p, IndexMode::None);
                    cpu.memory.write(addr, rp as u8);
                    cpu.memory.write(addr.wrapping_add(1), (rp >> 8) as u8);
                } else {
                    let lo = cpu.memory.read(addr) as u16;
                    let hi = cpu.memory.read(addr.wrapping_add(1)) as u16;
                    cpu.set_rp(p, lo | (hi << 8), IndexMode::None);
                }
                Ok(())
            }
            4 => {
                // NEG
                let a = cpu.a;
                cpu.a = cpu.sub8(0, a, false);
                Ok(())
            }
            5 => {
                // RETN (y!=1) / RETI (y==1)
                cpu.pc = cpu.pop_word();
                cpu.iff1 = cpu.iff2;
                Ok(())
            }
            6 => {
                cpu.im = match y % 4 {
                    0 | 1 => 0,
                    2 => 1,
                    3 => 2,
                    _ => unreachable!("y % 4 < 4"),
                };
                Ok(())
            }
            7 => {
                match y {
                    0 => cpu.i = cpu.a,     // LD I,A
                    1 => cpu.r = cpu.a,     // LD R,A
                    2 => {
                        // LD A,I
                        cpu.a = cpu.i;
                        cpu.f = (cpu.f & crate::cpu::flags::C)
                            | crate::cpu::flags::SZ53[cpu.a as usize];
                        cpu.set_flag_pv(cpu.iff2);
                    }
                    3 => {
                        // LD A,R
                        cpu.a = cpu.r;
                        cpu.f = (cpu.f & crate::cpu::flags::C)
                            | crate::cpu::flags::SZ53[cpu.a as usize];
                        cpu.set_flag_pv(cpu.iff2);
                    }
                    4 => rrd(cpu),
                    5 => rld(cpu),
                    _ => unreachable!("undefined ED z=7 slots are rejected at decode time"),
                }
                Ok(())
            }
            _ => unreachable!("z is a 3-bit field"),
        },
        2 => execute_bli(cpu, y, z),
        _ => Err(CpuError::InvalidOpcode(vec![0xED, opcode])),
    }
}

fn rrd(cpu: &mut Cpu) {
    let mem = cpu.memory.read(cpu.hl);
    let new_mem = (cpu.a << 4) | (mem >> 4);
    let new_a = (cpu.a & 0xF0) | (mem & 0x0F);
    cpu.memory.write(cpu.hl, new_mem);
    cpu.a = new_a;
    cpu.f = (cpu.f & crate::cpu::flags::C) | crate::cpu::flags::SZ53P[cpu.a as usize];
}

fn rld(cpu: &mut Cpu) {
    let mem = cpu.memory.read(cpu.hl);
    let new_mem = (mem << 4) | (cpu.a & 0x0F);
    let new_a = (cpu.a & 0xF0) | (mem >> 4);
    cpu.memory.write(cpu.hl, new_mem);
    cpu.a = new_a;
    cpu.f = (cpu.f & crate::cpu::flags::C) | crate::cpu::flags::SZ53P[cpu.a as usize];
}

/// Block instructions: `LDxx`/`CPxx`/`INxx`/`OUTxx` and their repeating
/// `*IR`/`*DR` forms. `y` selects increment(4)/decrement(5)/repeat-inc(6)
/// /repeat-dec(7); `z` selects the family (LD/CP/IN/OUT).
fn execute_bli(cpu: &mut Cpu, y: u8, z: u8) -> Result<(), CpuError> {
    let increment = y == 4 || y == 6;
    let repeat = y == 6 || y == 7;

    let keep_going = match z {
        0 => bli_ld(cpu, increment),
        1 => bli_cp(cpu, increment),
        2 => bli_in(cpu, increment)?,
        3 => bli_out(cpu, increment)?,
        _ => unreachable!("z is restricted to 0..=3 by is_valid_ed_opcode"),
    };

    if repeat && keep_going {
        cpu.pc = cpu.pc.wrapping_sub(2);
    }
    Ok(())
}

fn step_hl_de(cpu: &mut Cpu, increment: bool) {
    if increment {
        cpu.hl = cpu.hl.wrapping_add(1);
        cpu.de = cpu.de.wrapping_add(1);
    } else {
        cpu.hl = cpu.hl.wrapping_sub(1);
        cpu.de = cpu.de.wrapping_sub(1);
    }
}

fn bli_ld(cpu: &mut Cpu, increment: bool) -> bool {
    let val = cpu.memory.read(cpu.hl);
    cpu.memory.write(cpu.de, val);
    step_hl_de(cpu, increment);
    cpu.bc = cpu.bc.wrapping_sub(1);

    let n = val.wrapping_add(cpu.a);
    cpu.f &= crate::cpu::flags::S | crate::cpu::flags::Z | crate::cpu::flags::C;
    cpu.set_flag_pv(cpu.bc != 0);
    cpu.f |= n & crate::cpu::flags::F3;
    if n & 0x02 != 0 {
        cpu.f |= crate::cpu::flags::F5;
    }
    cpu.bc != 0
}

fn bli_cp(cpu: &mut Cpu, increment: bool) -> bool {
    let val = cpu.memory.read(cpu.hl);
    let result = cpu.a.wrapping_sub(val);
    let half = (cpu.a & 0x0F) < (val & 0x0F);

    if increment {
        cpu.hl = cpu.hl.wrapping_add(1);
    } else {
        cpu.hl = cpu.hl.wrapping_sub(1);
    }
    cpu.bc = cpu.bc.wrapping_sub(1);

    let carry = cpu.flag_c();
    cpu.f = crate::cpu::flags::SZ53[result as usize] & (crate::cpu::flags::S | crate::cpu::flags::Z);
    cpu.set_flag_h(half);
    let n = result.wrapping_sub(if half { 1 } else { 0 });
    cpu.f |= n & crate::cpu::flags::F3;
    if n & 0x02 != 0 {
        cpu.f |= crate::cpu::flags::F5;
    }
    cpu.set_flag_pv(cpu.bc != 0);
    cpu.set_flag_n(true);
    cpu.set_flag_c(carry);
    // CPIR/CPDR also stop as soon as a match is found, not only when BC
    // reaches zero.
    cpu.bc != 0 && !cpu.flag_z()
}

fn bli_in(cpu: &mut Cpu, increment: bool) -> Result<bool, CpuError> {
    let val = io_read(cpu, cpu.c())?;
    cpu.memory.write(cpu.hl, val);
    if increment {
        cpu.hl = cpu.hl.wrapping_add(1);
    } else {
        cpu.hl = cpu.hl.wrapping_sub(1);
    }
    let b = cpu.dec8(cpu.b());
    cpu.set_b(b);
    cpu.set_flag_n(val & 0x80 != 0);
    Ok(b != 0)
}

fn bli_out(cpu: &mut Cpu, increment: bool) -> Result<bool, CpuError> {
    let b = cpu.dec8(cpu.b());
    cpu.set_b(b);
    let val = cpu.memory.read(cpu.hl);
    io_write(cpu, cpu.c(), val)?;
    if increment {
        cpu.hl = cpu.hl.wrapping_add(1);
    } else {
        cpu.hl = cpu.hl.wrapping_sub(1);
    }
    cpu.set_flag_n(val & 0x80 != 0);
    Ok(b != 0)
}
