//! Wire format shared by the trace event publisher and subscriber.
//!
//! A trace event travels between processes as a single message framed as a
//! length-prefixed sequence: one byte of element count, a 16-bit
//! discriminant identifying the event kind, then the fields of that kind.
//! Strings carry an explicit byte-length prefix (no terminator), timings
//! are 64-bit floats in nanoseconds.
//!
//! The format is self-describing enough for a subscriber to skip event
//! kinds it does not know ([`DecodeError::UnknownKind`]) instead of
//! misreading the fields that follow. It is **not** meant to be stable
//! across versions; both ends of a session are expected to be built from
//! the same revision.

mod codec;
mod event;

pub use self::codec::DecodeError;
pub use self::event::{CLOCK_UNAVAILABLE, Event};
