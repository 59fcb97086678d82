pub mod in_memory_embedding_store;
pub mod json_embedding_store;
