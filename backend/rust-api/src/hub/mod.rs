pub mod client;
pub mod registry;

pub use client::{ClientSession, FrameContext, FrameHandler};
pub use registry::{Connection, ConnectionId, Hub};
