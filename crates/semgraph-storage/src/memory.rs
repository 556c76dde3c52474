//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryStore`] keeps the encoded container of each graph in a map. It
//! serves tests and sessions that never touch the disk.

use std::collections::HashMap;
use std::io::Cursor;

use semgraph_core::{Factory, Schema};

use crate::codec::{load_from, save_to};
use crate::error::StorageError;
use crate::header::Header;
use crate::traits::GraphStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    graphs: HashMap<String, Vec<u8>>,
    zip: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zipped(mut self, zip: bool) -> Self {
        self.zip = zip;
        self
    }

    /// Encoded bytes of a stored graph.
    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.graphs.get(name).map(Vec::as_slice)
    }
}

impl GraphStore for InMemoryStore {
    fn save<S: Schema>(
        &mut self,
        name: &str,
        factory: &Factory<S>,
        header: &Header,
    ) -> Result<(), StorageError> {
        let mut bytes = Vec::new();
        save_to(factory, &mut bytes, header, self.zip)?;
        self.graphs.insert(name.to_string(), bytes);
        Ok(())
    }

    fn load<S: Schema>(
        &self,
        name: &str,
        factory: &mut Factory<S>,
        header: &mut Header,
    ) -> Result<(), StorageError> {
        let bytes = self
            .graphs
            .get(name)
            .ok_or_else(|| StorageError::GraphNotFound {
                name: name.to_string(),
            })?;
        load_from(factory, Cursor::new(bytes), header)
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.graphs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        self.graphs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::GraphNotFound {
                name: name.to_string(),
            })
    }
}
