//! Schema selection and the lifecycle of in-flight fetches and saves.
//!
//! Only one state fetch is live at a time. Selecting a schema or starting a
//! refetch aborts the previous handle, and a response is accepted only through
//! the handle that is still current.

use crate::error::{EditorError, Result};
use crate::pending::PendingOperation;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Cancellation token for one state fetch. The host wires `is_aborted` to its
/// request's abort controller.
#[derive(Clone, Debug)]
pub struct FetchHandle {
    schema: String,
    generation: u64,
    aborted: Rc<Cell<bool>>,
}

impl FetchHandle {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn abort(&self) {
        self.aborted.set(true);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.get()
    }
}

/// A batch of pending operations handed to the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub schema: String,
    pub operations: Vec<PendingOperation>,
}

#[derive(Debug, Default)]
pub struct Session {
    schemas: Vec<String>,
    active: Option<String>,
    generation: u64,
    inflight: Option<FetchHandle>,
    /// Schema whose state has been loaded into the store at least once.
    loaded: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_schemas(&mut self, schemas: Vec<String>) {
        self.schemas = schemas;
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn inflight(&self) -> Option<&FetchHandle> {
        self.inflight.as_ref()
    }

    fn start_fetch(&mut self, schema: String) -> FetchHandle {
        if let Some(prev) = self.inflight.take() {
            debug!(schema = %prev.schema, generation = prev.generation, "aborting previous fetch");
            prev.abort();
        }
        self.generation += 1;
        let handle = FetchHandle {
            schema,
            generation: self.generation,
            aborted: Rc::new(Cell::new(false)),
        };
        self.inflight = Some(handle.clone());
        handle
    }

    /// Switches to `schema` and returns the handle for its state fetch. An
    /// empty schema list accepts any name.
    pub fn select_schema(&mut self, schema: &str) -> Result<FetchHandle> {
        if !self.schemas.is_empty() && !self.schemas.iter().any(|s| s == schema) {
            return Err(EditorError::UnknownSchema(schema.to_string()));
        }
        self.active = Some(schema.to_string());
        Ok(self.start_fetch(schema.to_string()))
    }

    /// Starts a fresh fetch of the active schema.
    pub fn begin_refetch(&mut self) -> Option<FetchHandle> {
        let schema = self.active.clone()?;
        Some(self.start_fetch(schema))
    }

    /// Whether a response delivered through `handle` may be applied. Accepting
    /// retires the handle.
    pub fn accept(&mut self, handle: &FetchHandle) -> bool {
        let current = self
            .inflight
            .as_ref()
            .is_some_and(|h| h.generation == handle.generation && !h.is_aborted());
        if !current {
            warn!(schema = %handle.schema, generation = handle.generation, "dropping stale fetch response");
            return false;
        }
        self.inflight = None;
        true
    }

    /// Marks the active schema as loaded. Returns `true` the first time a
    /// schema is loaded, when the store must start from empty.
    pub fn mark_loaded(&mut self, schema: &str) -> bool {
        if self.loaded.as_deref() == Some(schema) {
            return false;
        }
        self.loaded = Some(schema.to_string());
        true
    }

    pub fn save_request(&self, operations: &[PendingOperation]) -> Option<SaveRequest> {
        let schema = self.active.clone()?;
        if operations.is_empty() {
            return None;
        }
        Some(SaveRequest {
            schema,
            operations: operations.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_schema_aborts_previous_fetch() {
        let mut s = Session::new();
        s.set_schemas(vec!["a".into(), "b".into()]);
        let first = s.select_schema("a").unwrap();
        let second = s.select_schema("b").unwrap();
        assert!(first.is_aborted());
        assert!(!s.accept(&first));
        assert!(s.accept(&second));
        // Retired after acceptance.
        assert!(!s.accept(&second));
        assert_eq!(s.active(), Some("b"));
    }

    #[test]
    fn unknown_schema_rejected() {
        let mut s = Session::new();
        s.set_schemas(vec!["a".into()]);
        assert_eq!(s.select_schema("zzz").unwrap_err().code(), "unknown_schema");
        assert!(s.active().is_none());
    }

    #[test]
    fn host_abort_drops_response() {
        let mut s = Session::new();
        let h = s.select_schema("x").unwrap();
        h.abort();
        assert!(!s.accept(&h));
    }

    #[test]
    fn refetch_needs_active_schema() {
        let mut s = Session::new();
        assert!(s.begin_refetch().is_none());
        let h1 = s.select_schema("x").unwrap();
        let h2 = s.begin_refetch().unwrap();
        assert!(h1.is_aborted());
        assert_eq!(h2.schema(), "x");
        assert!(s.mark_loaded("x"));
        assert!(!s.mark_loaded("x"));
    }
}
