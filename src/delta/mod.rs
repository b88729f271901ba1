//! Delta engine: diff, emptiness test, apply.
//!
//! All three are pure functions over `Session` values:
//!
//! - `diff(old, new)`: sparse `StateDelta` describing what changed
//! - `StateDelta::is_empty()`: suppresses empty sends
//! - `apply(state, delta, ctx)`: new state with the delta merged in

pub mod types;
pub mod diff;
pub mod apply;

pub use types::{CellChange, PlayerDelta, StateDelta};
pub use diff::diff;
pub use apply::{apply, ApplyContext, Viewer};
