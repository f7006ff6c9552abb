//! Wrapping sequence numbers used to order player input samples.

/// Sequence number stamped on each input sample by the client.
///
/// The counter wraps around after 255, so ordering is only meaningful
/// between numbers that are less than half the ring apart.
pub type SequenceNumber = u8;

/// Returns the signed distance `a - b` on the wrapping sequence ring.
///
/// The result lies in `-128..=127`: positive when `a` is newer than `b`,
/// negative when it is older and zero when both are equal.
pub fn seq_difference(a: SequenceNumber, b: SequenceNumber) -> i32 {
    a.wrapping_sub(b) as i8 as i32
}

/// Returns true if `a` was issued strictly after `b`.
pub fn seq_newer(a: SequenceNumber, b: SequenceNumber) -> bool {
    seq_difference(a, b) > 0
}
