//! Error types surfaced by the CPU core.

use std::fmt;

/// Render a decoder byte path as an uppercase, `0x`-prefixed hex string.
///
/// Used both by [`CpuError::InvalidOpcode`]'s `Display` impl and by hosts
/// that want to show the same rendering in a debugger.
pub fn call_chain_to_hex(path: &[u8]) -> String {
    let mut s = String::with_capacity(2 + path.len() * 2);
    s.push_str("0x");
    for byte in path {
        s.push_str(&format!("{byte:02X}"));
    }
    s
}

/// Errors the CPU core can report. The core never recovers from these on
/// its own; register and memory state at the moment of failure is left
/// untouched so a host can inspect it.
#[derive(Debug, thiserror::Error)]
pub enum CpuError {
    /// The decoder walked a prefix path and landed on an empty or
    /// out-of-range slot. `path` is the sequence of bytes read, in the
    /// order they were fetched (displacement bytes are not included).
    #[error("invalid opcode at path {}", call_chain_to_hex(.0))]
    InvalidOpcode(Vec<u8>),

    /// `execute()` was called without a preceding successful `fetch()`.
    #[error("execute() called with no prepared instruction")]
    NotFetched,

    /// The CPU executed a `HALT` instruction. PC is left pointing just
    /// past the `HALT` opcode byte.
    #[error("cpu halted")]
    CpuHalted,

    /// A host-registered I/O callback reported failure.
    #[error("i/o callback failed: {0}")]
    IoCallbackError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CpuError {
    /// Wrap an arbitrary host error as an [`CpuError::IoCallbackError`].
    pub fn io_callback(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        CpuError::IoCallbackError(Box::new(err))
    }
}

/// A minimal string-backed error for hosts that want to signal I/O
/// failure without defining their own error type.
#[derive(Debug)]
pub struct IoError(pub String);

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {}
