//! Persistent memory storage.

mod layout;
mod store;

pub use layout::StoreLayout;
pub use store::MemoryStore;
