//! In-memory schema registry.

// Lock poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::{InputTypes, Schema, SchemaError};
use crate::contract::{Operation, SchemaId};

/// Default capacity of a [`SchemaRegistry`].
pub const DEFAULT_MAX_SCHEMAS: usize = 1024;

/// Write-once store of schemas keyed by their content-derived id.
///
/// Unknown ids are always reported as [`SchemaError::NotFound`]; nothing is
/// ever inferred for a schema that was not registered.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<SchemaId, Arc<Schema>>>,
    max_schemas: usize,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SCHEMAS)
    }

    #[must_use]
    pub fn with_capacity(max_schemas: usize) -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            max_schemas,
        }
    }

    /// Registers a schema and returns its id.
    ///
    /// Registering content that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::Invalid`] if the schema is internally inconsistent
    /// - [`SchemaError::Conflict`] if different content holds the same id
    /// - [`SchemaError::RegistryFull`] if capacity is exhausted
    pub fn register(&self, schema: Schema) -> Result<SchemaId, SchemaError> {
        schema.check_definition()?;
        let id = schema.id();

        let mut schemas = self.schemas.write().expect("lock poisoned");
        if let Some(existing) = schemas.get(&id) {
            if **existing == schema {
                return Ok(id);
            }
            return Err(SchemaError::Conflict(id));
        }
        if schemas.len() >= self.max_schemas {
            return Err(SchemaError::RegistryFull {
                max: self.max_schemas,
            });
        }
        debug!(schema_id = %id, name = %schema.name, "registered schema");
        schemas.insert(id, Arc::new(schema));
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns [`SchemaError::NotFound`] for unknown ids.
    pub fn get(&self, id: &SchemaId) -> Result<Arc<Schema>, SchemaError> {
        self.schemas
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or(SchemaError::NotFound(*id))
    }

    /// Checks an operation's structure against a registered schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotFound`] for unknown schemas and
    /// [`SchemaError::Shape`] on structural mismatch.
    pub fn validate_operation_shape(
        &self,
        id: &SchemaId,
        operation: &Operation,
        inputs: &InputTypes,
    ) -> Result<(), SchemaError> {
        self.get(id)?.check_shape(operation, inputs)?;
        Ok(())
    }

    /// All registered schemas, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<(SchemaId, Arc<Schema>)> {
        let mut all: Vec<_> = self
            .schemas
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(id, schema)| (*id, Arc::clone(schema)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.read().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
