//! Wire protocol and the adapters that move it in and out of bots

pub mod feed;
pub mod inbox;
pub mod protocol;
pub mod sink;
