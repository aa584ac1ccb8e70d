//! The recursive JSON schema learner: inference, merging, and the
//! persisted descriptor shape.

pub mod descriptor;
pub mod learner;

pub use descriptor::{merge, Descriptor, FormatHint};
pub use learner::{infer, learn};
