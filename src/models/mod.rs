//! Data models for the ISIS administration backend.
//!
//! Every collection implements [`Entity`] so storage, imports and handlers stay generic.

mod arion;
mod record;
mod rse;
mod special;
mod student;
mod teaching;
mod user;
mod vacataire;

pub use arion::*;
pub use record::*;
pub use rse::*;
pub use special::*;
pub use student::*;
pub use teaching::*;
pub use user::*;
pub use vacataire::*;
