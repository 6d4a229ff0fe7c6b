pub mod json_entity_store;
pub mod memory_entity_store;

pub use json_entity_store::JsonEntityStore;
pub use memory_entity_store::MemoryEntityStore;
