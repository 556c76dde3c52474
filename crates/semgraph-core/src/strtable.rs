//! String interning for textual node attributes.
//!
//! Nodes never hold text directly: a [`Key`] is stored instead, so merging
//! two graphs only needs a key remap. Key 0 always denotes the empty string.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::io::{BinaryReader, BinaryWriter};

const TAG: &[u8] = b"STRTBL";

/// Handle to an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(pub u32);

impl Key {
    pub const EMPTY: Key = Key(0);
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps keys of a loaded table to keys of the live table.
pub type KeyMap = HashMap<Key, Key>;

/// Deduplicating string store.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    // Key(n) is index n - 1.
    strings: IndexSet<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, value: &str) -> Key {
        if value.is_empty() {
            return Key::EMPTY;
        }
        if let Some(index) = self.strings.get_index_of(value) {
            return key_of(index);
        }
        let (index, _) = self.strings.insert_full(value.to_owned());
        key_of(index)
    }

    pub fn get(&self, key: Key) -> Option<&str> {
        if key == Key::EMPTY {
            return Some("");
        }
        self.strings
            .get_index(key.0 as usize - 1)
            .map(String::as_str)
    }

    /// Key of an already interned string.
    pub fn lookup(&self, value: &str) -> Option<Key> {
        if value.is_empty() {
            return Some(Key::EMPTY);
        }
        self.strings.get_index_of(value).map(key_of)
    }

    /// Number of non-empty strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(index, s)| (key_of(index), s.as_str()))
    }

    /// Writes the given keys. Unknown keys and the empty key are skipped.
    pub fn save<W, I>(&self, w: &mut BinaryWriter<W>, keys: I) -> io::Result<()>
    where
        W: Write,
        I: IntoIterator<Item = Key>,
    {
        w.write_bytes(TAG)?;
        for key in keys {
            if key == Key::EMPTY {
                continue;
            }
            if let Some(value) = self.get(key) {
                w.write_u32(key.0)?;
                w.write_str(value)?;
            }
        }
        w.write_u32(Key::EMPTY.0)
    }

    /// Writes every string.
    pub fn save_all<W: Write>(&self, w: &mut BinaryWriter<W>) -> io::Result<()> {
        let keys: Vec<Key> = self.iter().map(|(key, _)| key).collect();
        self.save(w, keys)
    }

    /// Reads a saved table and merges it into this one.
    ///
    /// Returns the mapping from the keys found in the stream to the keys the
    /// same strings have here.
    pub fn load_merge<R: Read>(&mut self, r: &mut BinaryReader<R>) -> io::Result<KeyMap> {
        r.expect_tag(TAG)?;
        let mut map = KeyMap::new();
        loop {
            let key = Key(r.read_u32()?);
            if key == Key::EMPTY {
                break;
            }
            let value = r.read_str()?;
            map.insert(key, self.intern(&value));
        }
        Ok(map)
    }
}

fn key_of(index: usize) -> Key {
    Key(index as u32 + 1)
}
