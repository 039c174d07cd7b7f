//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod memory;
pub mod telegram;

pub use channel::*;
pub use cli::CliChannel;
pub use memory::{MemoryChannel, SentMessage};
pub use telegram::TelegramChannel;
