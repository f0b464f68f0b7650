//! Map Function Registry
//!
//! Functions cannot travel over the wire, so workers keep a registry that maps
//! function names (e.g., "ground_points") to executable Rust closures. A payload
//! names the function; the worker looks it up here and runs it on the chunk.

use super::types::TaskPayload;

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a thread-safe, asynchronous map function.
/// It takes the chunk's `TaskPayload` and resolves to the chunk's JSON result.
pub type MapFunction = Arc<
    dyn Fn(TaskPayload) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// Registry holding the mapping between function names and their implementation.
pub struct MapFunctionRegistry {
    functions: DashMap<String, MapFunction>,
}

impl MapFunctionRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a map function under a specific name, replacing any previous one.
    ///
    /// # Arguments
    /// * `name` - The identifier payloads use to select the function.
    /// * `function` - The closure invoked once per chunk.
    pub fn register<F, Fut>(&self, name: &str, function: F)
    where
        F: Fn(TaskPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        // Box::pin type-erases the concrete Future so different functions share the map.
        let map_fn: MapFunction = Arc::new(move |payload: TaskPayload| {
            Box::pin(function(payload))
                as Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
        });

        self.functions.insert(name.to_string(), map_fn);

        tracing::info!("Registered map function: {}", name);
    }

    /// Looks up the payload's function and runs it on the payload's chunk.
    ///
    /// # Returns
    /// * `Ok(value)` with the function's result.
    /// * `Err` if the function failed or no function exists under that name.
    pub async fn execute(&self, payload: TaskPayload) -> Result<serde_json::Value> {
        // Clone the Arc out so no map guard is held across the await.
        let map_fn = self
            .functions
            .get(&payload.function)
            .map(|entry| entry.value().clone());

        match map_fn {
            Some(map_fn) => {
                tracing::debug!(
                    "Executing '{}' on chunk {} (bytes {}..{}, attempt {})",
                    payload.function,
                    payload.chunk.chunk_index,
                    payload.chunk.byte_offset,
                    payload.chunk.byte_end(),
                    payload.attempt
                );
                map_fn(payload).await
            }
            None => {
                let error = format!("Unknown map function: {}", payload.function);
                tracing::error!("{}", error);
                Err(anyhow::anyhow!(error))
            }
        }
    }

    /// Returns a sorted list of all registered function names.
    pub fn list_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

impl Default for MapFunctionRegistry {
    fn default() -> Self {
        Self {
            functions: DashMap::new(),
        }
    }
}
