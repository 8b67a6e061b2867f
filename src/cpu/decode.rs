//! Prefix-tree instruction decoder.
//!
//! Walks bytes from `PC` until it lands on an executable opcode slot.
//! Handles the `DD CB`/`FD CB` special case where a displacement byte
//! precedes the final opcode byte, and the rule that a chain of `DD`/`FD`
//! prefixes collapses to whichever one came last.

use super::execute;
use super::helpers::IndexMode;
use super::Cpu;
use crate::error::CpuError;

/// Which opcode table a prepared instruction's final byte indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Base,
    Cb,
    Ed,
}

/// The result of a successful `fetch()`: everything `execute()` needs to
/// run the instruction, without re-reading memory at `PC`.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Bytes read during decode, in order, *excluding* any displacement
    /// byte. This is what [`crate::error::call_chain_to_hex`] renders.
    pub path: Vec<u8>,
    pub(crate) page: Page,
    pub(crate) opcode: u8,
    pub(crate) index: IndexMode,
    pub(crate) displacement: Option<i8>,
}

/// Decode the instruction at `PC`.
pub(super) fn decode(cpu: &mut Cpu) -> Result<Prepared, CpuError> {
    let mut path = Vec::new();
    let mut index = IndexMode::None;

    loop {
        let byte = cpu.fetch_opcode_byte();
        path.push(byte);
        match byte {
            0xDD => {
                index = IndexMode::Ix;
                continue;
            }
            0xFD => {
                index = IndexMode::Iy;
                continue;
            }
            0xED => {
                let opcode = cpu.fetch_opcode_byte();
                path.push(opcode);
                if !execute::is_valid_ed_opcode(opcode) {
                    return Err(CpuError::InvalidOpcode(path));
                }
                return Ok(Prepared {
                    path,
                    page: Page::Ed,
                    opcode,
                    index: IndexMode::None,
                    displacement: None,
                });
            }
            0xCB => {
                let displacement = if index != IndexMode::None {
                    Some(cpu.fetch_displacement())
                } else {
                    None
                };
                let opcode = cpu.fetch_opcode_byte();
                path.push(opcode);
                return Ok(Prepared {
                    path,
                    page: Page::Cb,
                    opcode,
                    index,
                    displacement: None,
                }
                .with_displacement(displacement));
            }
            _ => {
                return Ok(Prepared {
                    path,
                    page: Page::Base,
                    opcode: byte,
                    index,
                    displacement: None,
                });
            }
        }
    }
}

impl Prepared {
    fn with_displacement(mut self, displacement: Option<i8>) -> Self {
        self.displacement = displacement;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;

    fn cpu_with(bytes: &[u8]) -> Cpu {
        Cpu::new(Some(bytes))
    }

    #[test]
    fn base_opcode_path_is_single_byte() {
        let mut cpu = cpu_with(&[0x00]);
        cpu.fetch().unwrap();
        assert_eq!(cpu.peek_prepared().path, vec![0x00]);
    }

    #[test]
    fn ddcb_path_excludes_displacement() {
        // FD CB AB 10 76 -- RL (IY-0x55); path renders as 0xFDCB10.
        let mut cpu = cpu_with(&[0xFD, 0xCB, 0xAB, 0x10, 0x76]);
        cpu.fetch().unwrap();
        let prepared = cpu.peek_prepared();
        assert_eq!(prepared.path, vec![0xFD, 0xCB, 0x10]);
        assert_eq!(prepared.displacement, Some(-85));
    }

    #[test]
    fn invalid_ed_opcode_reports_path() {
        let mut cpu = cpu_with(&[0xED, 0xFF]);
        let err = cpu.fetch().unwrap_err();
        match err {
            CpuError::InvalidOpcode(path) => assert_eq!(path, vec![0xED, 0xFF]),
            other => panic!("expected InvalidOpcode, got {other:?}"),
        }
    }

    #[test]
    fn repeated_prefix_collapses_to_last() {
        // DD FD 21 34 12 -- LD IY,0x1234 (DD discarded).
        let mut cpu = cpu_with(&[0xDD, 0xFD, 0x21, 0x34, 0x12]);
        cpu.fetch().unwrap();
        let prepared = cpu.peek_prepared();
        assert_eq!(prepared.index, IndexMode::Iy);
        assert_eq!(prepared.path, vec![0xDD, 0xFD, 0x21]);
    }

    #[test]
    fn not_fetched_before_first_fetch() {
        let mut cpu = cpu_with(&[0x00]);
        assert!(matches!(cpu.execute(), Err(CpuError::NotFetched)));
    }
}
