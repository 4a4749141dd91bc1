//! Shared bit-width arithmetic
//!
//! Every width in the encoding table comes down to `bits_needed`: the number
//! of bits required to distinguish `n` alternatives. The same function sizes
//! the opcode field, the per-depth form selectors, and enum-backed modifier
//! fields, so it lives here rather than in the synthesizer.

/// Bits required to represent `count` distinct values.
///
/// Zero and one alternatives need no bits at all; otherwise this is
/// `ceil(log2(count))`.
pub fn bits_needed(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}
