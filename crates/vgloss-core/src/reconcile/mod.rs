pub mod diff;
pub mod path_index;

pub use diff::{mod_time_nanos, ChangeSet, Reconciler};
pub use path_index::PathIndex;
