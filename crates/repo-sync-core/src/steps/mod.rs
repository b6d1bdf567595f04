//! The three job steps: checkout, archive, sync.
//!
//! Each step is a free async function over a [`GitRunner`] so the job
//! pipeline decides ordering and failure policy.
//!
//! [`GitRunner`]: crate::git::GitRunner

pub mod archive;
pub mod checkout;
pub mod sync;

pub use archive::archive_checkout;
pub use checkout::{checkout, CheckoutOutcome};
pub use sync::{classify_push_failure, sync_main};
