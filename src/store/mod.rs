//! Persistence layer: the user store and the backends it writes through.

pub mod json_file;
pub mod memory;
pub mod traits;
pub mod user_store;

pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use traits::{StoreBackend, UserEntries};
pub use user_store::UserStore;
