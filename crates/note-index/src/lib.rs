//! Durable mapping between stable note ids, current canonical paths, and
//! monotonic revisions — decoupled from the mutable filesystem paths a note
//! lives at. See `index.rs` for the full contract.

pub mod clock;
mod ids;
mod index;
pub mod persistence;

pub use clock::{Clock, FakeClock, SystemClock};
pub use ids::NoteId;
pub use index::{IndexError, NoteIdentity, NoteIndex, NoteRecord, ResolvedNote};
