//! Configuration model, translation, merge, and validation.
//!
//! The write path runs: existing vendor config -> internal baseline ->
//! patch merge -> family validation -> outgoing vendor config with the
//! opaque extension object preserved. Each stage lives in its own module
//! and is pure; the gateway performs the surrounding I/O.

pub mod merge;
pub mod model;
pub mod translate;
pub mod validate;

pub use merge::{merge_and_validate, merge_patch};
pub use model::MinerConfig;
pub use translate::{to_internal, to_vendor};
pub use validate::{ConstraintError, ConstraintValidator, validator_for};
