//! The [`GraphStore`] trait: named graphs kept by a backend.
//!
//! Every backend stores the same container produced by
//! [`save_to`](crate::codec::save_to), so graphs move between backends
//! byte for byte.

use semgraph_core::{Factory, Schema};

use crate::error::StorageError;
use crate::header::Header;

/// Storage contract for whole graphs, keyed by name.
///
/// The trait is synchronous; a factory is single-threaded anyway.
pub trait GraphStore {
    // -------------------------------------------------------------------
    // Graph-level operations
    // -------------------------------------------------------------------

    /// Saves `factory` under `name`, replacing an earlier graph of that
    /// name.
    fn save<S: Schema>(
        &mut self,
        name: &str,
        factory: &Factory<S>,
        header: &Header,
    ) -> Result<(), StorageError>;

    /// Replaces the contents of `factory` with the graph stored under
    /// `name`. Fails with [`StorageError::GraphNotFound`] if there is none.
    fn load<S: Schema>(
        &self,
        name: &str,
        factory: &mut Factory<S>,
        header: &mut Header,
    ) -> Result<(), StorageError>;

    /// Names of all stored graphs, sorted.
    fn list(&self) -> Result<Vec<String>, StorageError>;

    fn delete(&mut self, name: &str) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Convenience
    // -------------------------------------------------------------------

    fn contains(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.list()?.iter().any(|n| n == name))
    }
}
