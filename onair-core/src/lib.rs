//! Shared building blocks for the onair backend and its client: the room and
//! participant model, claim rules, engine events and the room session actor.

mod claim;
mod config;
mod events;
mod model;
mod util;

pub mod session;

pub use claim::*;
pub use config::*;
pub use events::*;
pub use model::*;
pub use util::*;
