//! Header blocks stored ahead of the node stream.
//!
//! A header is an ordered list of `(kind, bytes)` blocks. Kind
//! [`SCHEMA_IDENTITY`] is written by the codec itself and names the language
//! and versions the graph was saved with; every other kind belongs to the
//! caller and is carried through load and save verbatim.

use std::io::{self, Read, Write};

use indexmap::IndexMap;

use semgraph_core::io::{BinaryReader, BinaryWriter};
use semgraph_core::Schema;

use crate::error::StorageError;

/// Block kind of [`SchemaIdentity`].
pub const SCHEMA_IDENTITY: u16 = 1;

/// A typed header block.
pub trait HeaderData: Sized {
    const KIND: u16;

    fn encode<W: Write>(&self, w: &mut BinaryWriter<W>) -> io::Result<()>;

    fn decode<R: Read>(r: &mut BinaryReader<R>) -> io::Result<Self>;
}

/// Language and format versions a graph was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIdentity {
    pub language: String,
    pub api_version: String,
    pub binary_version: String,
}

impl SchemaIdentity {
    pub fn of<S: Schema>() -> Self {
        SchemaIdentity {
            language: S::LANGUAGE.to_string(),
            api_version: S::API_VERSION.to_string(),
            binary_version: S::BINARY_VERSION.to_string(),
        }
    }

    /// Fails unless this identity matches schema `S`.
    pub fn check<S: Schema>(&self) -> Result<(), StorageError> {
        if self.language.is_empty() {
            return Err(StorageError::MissingFileTypeInfo);
        }
        if self.api_version.is_empty() || self.binary_version.is_empty() {
            return Err(StorageError::MissingVersionInfo);
        }
        if self.language != S::LANGUAGE {
            return Err(StorageError::WrongFileType {
                expected: S::LANGUAGE.to_string(),
                found: self.language.clone(),
            });
        }
        if self.api_version != S::API_VERSION {
            return Err(StorageError::WrongVersion {
                field: "api",
                expected: S::API_VERSION.to_string(),
                found: self.api_version.clone(),
            });
        }
        if self.binary_version != S::BINARY_VERSION {
            return Err(StorageError::WrongVersion {
                field: "binary",
                expected: S::BINARY_VERSION.to_string(),
                found: self.binary_version.clone(),
            });
        }
        Ok(())
    }
}

impl HeaderData for SchemaIdentity {
    const KIND: u16 = SCHEMA_IDENTITY;

    fn encode<W: Write>(&self, w: &mut BinaryWriter<W>) -> io::Result<()> {
        w.write_str(&self.language)?;
        w.write_str(&self.api_version)?;
        w.write_str(&self.binary_version)
    }

    fn decode<R: Read>(r: &mut BinaryReader<R>) -> io::Result<Self> {
        Ok(SchemaIdentity {
            language: r.read_str()?,
            api_version: r.read_str()?,
            binary_version: r.read_str()?,
        })
    }
}

/// Caller blocks plus the identity found by the last load.
#[derive(Debug, Clone, Default)]
pub struct Header {
    blocks: IndexMap<u16, Vec<u8>>,
    identity: Option<SchemaIdentity>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw block. A kind may be present only once.
    pub fn insert_raw(&mut self, kind: u16, bytes: Vec<u8>) -> Result<(), StorageError> {
        if kind == SCHEMA_IDENTITY {
            return Err(StorageError::ReservedHeaderBlock { kind });
        }
        if self.blocks.contains_key(&kind) {
            return Err(StorageError::HeaderDataAlreadyLoaded { kind });
        }
        self.blocks.insert(kind, bytes);
        Ok(())
    }

    pub fn insert<T: HeaderData>(&mut self, data: &T) -> Result<(), StorageError> {
        let mut w = BinaryWriter::new(Vec::new());
        data.encode(&mut w)?;
        self.insert_raw(T::KIND, w.into_inner())
    }

    pub fn get_raw(&self, kind: u16) -> Option<&[u8]> {
        self.blocks.get(&kind).map(Vec::as_slice)
    }

    pub fn get<T: HeaderData>(&self) -> Result<Option<T>, StorageError> {
        match self.get_raw(T::KIND) {
            Some(bytes) => Ok(Some(T::decode(&mut BinaryReader::new(bytes))?)),
            None => Ok(None),
        }
    }

    pub fn remove(&mut self, kind: u16) -> Option<Vec<u8>> {
        self.blocks.shift_remove(&kind)
    }

    pub fn contains(&self, kind: u16) -> bool {
        self.blocks.contains_key(&kind)
    }

    /// Caller blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.blocks.iter().map(|(kind, bytes)| (*kind, bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Identity recorded in the last loaded file.
    pub fn identity(&self) -> Option<&SchemaIdentity> {
        self.identity.as_ref()
    }

    /// Writes `identity` first, then every caller block.
    pub(crate) fn write<W: Write>(
        &self,
        w: &mut BinaryWriter<W>,
        identity: &SchemaIdentity,
    ) -> io::Result<()> {
        let mut payload = BinaryWriter::new(Vec::new());
        identity.encode(&mut payload)?;

        w.write_u32(self.blocks.len() as u32 + 1)?;
        write_block(w, SCHEMA_IDENTITY, &payload.into_inner())?;
        for (kind, bytes) in &self.blocks {
            write_block(w, *kind, bytes)?;
        }
        Ok(())
    }

    pub(crate) fn read<R: Read>(r: &mut BinaryReader<R>) -> Result<Header, StorageError> {
        let count = r.read_u32()?;
        let mut header = Header::new();
        for _ in 0..count {
            let kind = r.read_u16()?;
            let len = r.read_u64()?;
            let bytes = r.read_bytes(len)?;
            if kind == SCHEMA_IDENTITY {
                if header.identity.is_some() {
                    return Err(StorageError::Corrupt {
                        reason: "schema identity block appears twice".to_string(),
                    });
                }
                let identity = SchemaIdentity::decode(&mut BinaryReader::new(bytes.as_slice()))
                    .map_err(|e| StorageError::Corrupt {
                        reason: format!("unreadable schema identity: {e}"),
                    })?;
                header.identity = Some(identity);
            } else if header.blocks.insert(kind, bytes).is_some() {
                return Err(StorageError::Corrupt {
                    reason: format!("header block {kind} appears twice"),
                });
            }
        }
        Ok(header)
    }

    /// Moves the blocks of a freshly read header into this one.
    pub(crate) fn absorb(&mut self, loaded: Header) -> Result<(), StorageError> {
        if let Some(kind) = loaded.blocks.keys().find(|kind| self.blocks.contains_key(*kind)) {
            return Err(StorageError::HeaderDataAlreadyLoaded { kind: *kind });
        }
        self.blocks.extend(loaded.blocks);
        self.identity = loaded.identity;
        Ok(())
    }
}

fn write_block<W: Write>(w: &mut BinaryWriter<W>, kind: u16, bytes: &[u8]) -> io::Result<()> {
    w.write_u16(kind)?;
    w.write_u64(bytes.len() as u64)?;
    w.write_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use semgraph_core::minipy::MiniPy;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct BuildInfo {
        tool: String,
        files: u32,
    }

    impl HeaderData for BuildInfo {
        const KIND: u16 = 42;

        fn encode<W: Write>(&self, w: &mut BinaryWriter<W>) -> io::Result<()> {
            w.write_str(&self.tool)?;
            w.write_u32(self.files)
        }

        fn decode<R: Read>(r: &mut BinaryReader<R>) -> io::Result<Self> {
            Ok(BuildInfo {
                tool: r.read_str()?,
                files: r.read_u32()?,
            })
        }
    }

    #[test]
    fn typed_blocks_roundtrip() {
        let mut header = Header::new();
        let info = BuildInfo {
            tool: "mini".into(),
            files: 3,
        };
        header.insert(&info).unwrap();
        assert_eq!(header.get::<BuildInfo>().unwrap(), Some(info));
        assert!(header.contains(42));
        assert_eq!(header.len(), 1);
    }

    #[test]
    fn duplicate_and_reserved_kinds_are_rejected() {
        let mut header = Header::new();
        header.insert_raw(7, vec![1]).unwrap();
        assert!(matches!(
            header.insert_raw(7, vec![2]),
            Err(StorageError::HeaderDataAlreadyLoaded { kind: 7 })
        ));
        assert!(matches!(
            header.insert_raw(SCHEMA_IDENTITY, vec![]),
            Err(StorageError::ReservedHeaderBlock { .. })
        ));
        assert_eq!(header.remove(7), Some(vec![1]));
        header.insert_raw(7, vec![2]).unwrap();
    }

    #[test]
    fn write_then_read_keeps_blocks_and_identity() {
        let mut header = Header::new();
        header.insert_raw(9, b"opaque".to_vec()).unwrap();
        header.insert_raw(3, vec![]).unwrap();
        let mut w = BinaryWriter::new(Vec::new());
        header.write(&mut w, &SchemaIdentity::of::<MiniPy>()).unwrap();

        let mut r = BinaryReader::new(Cursor::new(w.into_inner()));
        let read = Header::read(&mut r).unwrap();
        assert_eq!(read.identity(), Some(&SchemaIdentity::of::<MiniPy>()));
        let blocks: Vec<(u16, &[u8])> = read.blocks().collect();
        assert_eq!(blocks, vec![(9, &b"opaque"[..]), (3, &[] as &[u8])]);
    }

    #[test]
    fn absorb_rejects_kinds_the_caller_already_has() {
        let mut loaded = Header::new();
        loaded.insert_raw(5, vec![1]).unwrap();
        let mut caller = Header::new();
        caller.insert_raw(5, vec![2]).unwrap();
        assert!(matches!(
            caller.absorb(loaded),
            Err(StorageError::HeaderDataAlreadyLoaded { kind: 5 })
        ));
    }

    #[test]
    fn identity_checks() {
        let ok = SchemaIdentity::of::<MiniPy>();
        assert!(ok.check::<MiniPy>().is_ok());

        let mut other = ok.clone();
        other.language = "Cobol".into();
        assert!(matches!(other.check::<MiniPy>(), Err(StorageError::WrongFileType { .. })));

        let mut newer = ok.clone();
        newer.binary_version = "2.0.0".into();
        assert!(matches!(
            newer.check::<MiniPy>(),
            Err(StorageError::WrongVersion { field: "binary", .. })
        ));

        let mut api = ok.clone();
        api.api_version = "0.9".into();
        assert!(matches!(
            api.check::<MiniPy>(),
            Err(StorageError::WrongVersion { field: "api", .. })
        ));

        let mut blank = ok;
        blank.api_version.clear();
        assert!(matches!(blank.check::<MiniPy>(), Err(StorageError::MissingVersionInfo)));
    }
}
