pub mod block;
pub mod chat;
pub mod dismissal;
pub mod events;
pub mod offer;
pub mod room;
