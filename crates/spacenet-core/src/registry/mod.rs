//! Identity bookkeeping shared by the broker and the boundary.
//!
//! - **`handle_table`** – slot storage whose keys carry a generation, so a
//!   token that outlived its entry is rejected instead of aliasing whatever
//!   now occupies the slot.
//! - **`sequence`** – the monotonic allocator for input correlation ids.

pub mod handle_table;
pub mod sequence;
