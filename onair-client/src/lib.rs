//! Client side orchestration for onair rooms: the HTTP API, the room page
//! flow around a room session, and the reward claim flow.

mod api;
mod claim;
mod room_page;

pub use api::*;
pub use claim::*;
pub use room_page::*;
