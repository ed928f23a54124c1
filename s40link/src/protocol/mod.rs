//! Wire protocol: byte codec, framing and the command catalog.

pub mod codec;
pub mod command;
pub mod frame;

// Re-export common types
pub use command::{BLOCK_SIZE, Command, CommandFrame, FileHandle, INIT_ACK};
pub use frame::{Direction, Frame, split_frames};
