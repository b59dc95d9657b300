pub mod backend;
pub mod codec;
pub mod key_prefix;
pub mod memory;

pub use backend::{Result, StateStore, StorageError, StoreStats, WriteOp};
pub use codec::{decode_value, encode_value};
pub use memory::MemoryStore;
