//! Software transforms that need no platform codec.
//!
//! These are useful for exercising a session end to end on any machine,
//! e.g. from the `pump-file` tool or from tests.

mod delay_line;

pub use delay_line::DelayLine;

/// Status code: the transform does not accept more input (end of stream).
pub const E_NOT_ACCEPTING: i32 = -0x3ff2_c94b;
/// Status code: an argument (frame or buffer) is invalid.
pub const E_INVALID_ARG: i32 = -0x7ff8_ffa9;
/// Status code: a pump-allocated output buffer is too small.
pub const E_BUFFER_TOO_SMALL: i32 = -0x7ff8_ff86;
/// Status code: the call is not valid in the current state.
pub const E_UNEXPECTED: i32 = -0x7fff_0001;
