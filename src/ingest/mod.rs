//! Upload ingestion pipeline.
//!
//! bytes → [`reader`] → [`normalize`] → optional [`group`] → [`dispatch`] → store.

pub mod dispatch;
pub mod group;
pub mod normalize;
pub mod reader;

pub use dispatch::{dispatch, ImportMode, ImportReport};
pub use group::OrphanPolicy;
