//! Changed-bits representation and validation.
//!
//! Comparators describe which logical sub-fields of a context value changed
//! between two pushes as a bitmask. The mask is restricted to 31 bits so the
//! value is always representable as a signed small integer on platforms with
//! 32-bit signed-integer fast paths; the top bit is reserved.
//!
//! A comparator that returns a mask outside this range has violated its
//! contract. We never fail the render pass for that: the mask is clamped to
//! "all bits changed" (safe over-invalidation) and a diagnostic warning is
//! emitted with the offending value.

/// A bitmask describing which sub-fields of a context value changed.
pub type ChangedBits = u32;

/// All 31 usable bits set. This is the mask produced by the default
/// comparator when two values differ, and the clamp target for out-of-range
/// comparator results.
pub const ALL_BITS: ChangedBits = 0x7fff_ffff;

/// Validate a comparator result at the boundary.
///
/// In-range masks pass through unchanged. Masks that use the reserved top
/// bit are reported via the diagnostics channel and treated as "all bits
/// changed" so no consumer is ever under-invalidated.
pub fn clamp_changed_bits(bits: ChangedBits) -> ChangedBits {
    if bits > ALL_BITS {
        tracing::warn!(
            returned = bits,
            "comparator returned an out-of-range bitmask; expected a 31-bit \
             integer, treating as all bits changed"
        );
        ALL_BITS
    } else {
        bits
    }
}
