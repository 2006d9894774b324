//! Data models for support console entities

mod conversation;
mod message;
mod presence;
mod stats;
mod ticket;
mod user;

pub use conversation::*;
pub use message::*;
pub use presence::*;
pub use stats::*;
pub use ticket::*;
pub use user::*;
