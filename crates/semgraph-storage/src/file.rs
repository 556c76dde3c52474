//! File entry points for the graph container, plus a directory-backed
//! [`GraphStore`].

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use semgraph_core::{Factory, Schema};

use crate::codec::{load_from, read_header, save_to};
use crate::error::StorageError;
use crate::header::Header;
use crate::traits::GraphStore;

const EXTENSION: &str = "asg";

/// Writes the graph to `path`, replacing the file.
pub fn save_file<S: Schema>(
    factory: &Factory<S>,
    path: impl AsRef<Path>,
    header: &Header,
    zip: bool,
) -> Result<(), StorageError> {
    let file = File::create(path.as_ref())?;
    save_to(factory, BufWriter::new(file), header, zip)
}

/// Writes the graph at byte `offset` of `path`. Bytes outside the written
/// range are left alone, so the graph can be one section of a larger file.
pub fn save_file_at<S: Schema>(
    factory: &Factory<S>,
    path: impl AsRef<Path>,
    offset: u64,
    header: &Header,
    zip: bool,
) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path.as_ref())?;
    file.seek(SeekFrom::Start(offset))?;
    save_to(factory, BufWriter::new(file), header, zip)
}

pub fn load_file<S: Schema>(
    factory: &mut Factory<S>,
    path: impl AsRef<Path>,
    header: &mut Header,
) -> Result<(), StorageError> {
    load_file_at(factory, path, 0, header)
}

/// Reads a graph starting at byte `offset` of `path`.
pub fn load_file_at<S: Schema>(
    factory: &mut Factory<S>,
    path: impl AsRef<Path>,
    offset: u64,
    header: &mut Header,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), offset, "loading graph file");
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    load_from(factory, BufReader::new(file), header)
}

/// Reads the header of a graph file without touching any factory.
pub fn load_header<S: Schema>(path: impl AsRef<Path>) -> Result<Header, StorageError> {
    read_header::<S, _>(BufReader::new(File::open(path.as_ref())?))
}

/// Stores each graph as `<name>.asg` inside one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    zip: bool,
}

impl FileStore {
    /// Opens `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir, zip: false })
    }

    /// Compress graphs written from now on.
    pub fn zipped(mut self, zip: bool) -> Self {
        self.zip = zip;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    fn existing(&self, name: &str) -> Result<PathBuf, StorageError> {
        let path = self.path_of(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StorageError::GraphNotFound {
                name: name.to_string(),
            })
        }
    }
}

impl GraphStore for FileStore {
    fn save<S: Schema>(
        &mut self,
        name: &str,
        factory: &Factory<S>,
        header: &Header,
    ) -> Result<(), StorageError> {
        save_file(factory, self.path_of(name), header, self.zip)
    }

    fn load<S: Schema>(
        &self,
        name: &str,
        factory: &mut Factory<S>,
        header: &mut Header,
    ) -> Result<(), StorageError> {
        load_file(factory, self.existing(name)?, header)
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        fs::remove_file(self.existing(name)?)?;
        Ok(())
    }
}
