//! Deferred teardown coordinated across collections.
//!
//! - [`DisposalGroup`] the coordinator
//! - [`Disposable`] the teardown hook
//! - [`DisposalList`] a list that removes into and inserts out of a group

mod group;
mod list;

pub use group::{Disposable, DisposalGroup};
pub use list::DisposalList;
