pub mod anchor;

pub use anchor::{shift_array, suggest_anchor, AnchorTracker};
