//! Built-in map functions.
//!
//! They only look at the chunk descriptor, which makes them useful for checking a
//! deployment end to end without access to the object store.

use crate::executor::registry::MapFunctionRegistry;

pub const FN_CHUNK_INDEX: &str = "chunk_index";
pub const FN_BYTE_LENGTH: &str = "byte_length";

pub fn register_builtin(registry: &MapFunctionRegistry) {
    registry.register(FN_CHUNK_INDEX, |payload| async move {
        Ok(serde_json::json!(payload.chunk.chunk_index))
    });

    registry.register(FN_BYTE_LENGTH, |payload| async move {
        tracing::debug!(
            "Chunk {} covers {}",
            payload.chunk.chunk_index,
            payload
                .chunk
                .range_header()
                .unwrap_or_else(|| "no bytes".to_string())
        );
        Ok(serde_json::json!(payload.chunk.byte_length))
    });
}
