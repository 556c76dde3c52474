//! Binary container for a whole graph.
//!
//! Layout: a 4-byte magic tag (`ASGP` plain, `ASGZ` snappy-framed), then,
//! inside the optional compression layer, the header blocks, the node
//! stream terminated by `(0, 0)`, and the string table.
//!
//! Node records are written in forest preorder with filtering off, so the
//! whole arena is persisted. Loading places every node at its original id
//! before relations are resolved, which lets a relation name an id that is
//! decoded later.

use std::collections::BTreeSet;
use std::io::{self, Read, Write};

use snap::read::FrameDecoder;
use snap::write::FrameEncoder;

use semgraph_core::io::{BinaryReader, BinaryWriter};
use semgraph_core::{
    Factory, Key, Kind, Node, NodeId, Preorder, Schema, Value, VisitContext, VisitFlow, Visitor,
};

use crate::error::StorageError;
use crate::header::{Header, SchemaIdentity};

pub const MAGIC_PLAIN: &[u8; 4] = b"ASGP";
pub const MAGIC_ZIPPED: &[u8; 4] = b"ASGZ";

/// Largest node id accepted from a stream. The arena is dense, so an id
/// sizes it directly.
pub const MAX_NODE_ID: u32 = 1 << 22;

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Writes `factory` and the caller blocks of `header` to `writer`.
pub fn save_to<S, W>(
    factory: &Factory<S>,
    mut writer: W,
    header: &Header,
    zip: bool,
) -> Result<(), StorageError>
where
    S: Schema,
    W: Write,
{
    if zip {
        writer.write_all(MAGIC_ZIPPED)?;
        let mut encoder = FrameEncoder::new(&mut writer);
        write_body(factory, &mut encoder, header)?;
        encoder.flush()?;
    } else {
        writer.write_all(MAGIC_PLAIN)?;
        write_body(factory, &mut writer, header)?;
    }
    writer.flush()?;
    tracing::info!(
        language = S::LANGUAGE,
        nodes = factory.node_count(),
        zip,
        "graph saved"
    );
    Ok(())
}

fn write_body<S: Schema, W: Write>(
    factory: &Factory<S>,
    writer: W,
    header: &Header,
) -> Result<(), StorageError> {
    let mut w = BinaryWriter::new(writer);
    header.write(&mut w, &SchemaIdentity::of::<S>())?;

    let _filter_off = factory.turn_filter_off_safely();
    let mut nodes = NodeWriter {
        w: &mut w,
        keys: BTreeSet::new(),
        error: None,
    };
    Preorder::new()
        .safe_mode(true)
        .visit_shared(false)
        .run_forest(factory, &mut nodes)?;
    let NodeWriter { keys, error, .. } = nodes;
    if let Some(e) = error {
        return Err(e.into());
    }

    w.write_u32(NodeId::INVALID.0)?;
    w.write_u16(0)?;
    factory.strings().save(&mut w, keys)?;
    w.flush()?;
    Ok(())
}

/// Visitor writing one record per node and remembering the string keys in
/// use.
struct NodeWriter<'w, W: Write> {
    w: &'w mut BinaryWriter<W>,
    keys: BTreeSet<Key>,
    error: Option<io::Error>,
}

impl<W: Write> NodeWriter<'_, W> {
    fn write_node<S: Schema>(&mut self, node: &Node<S>) -> io::Result<()> {
        self.w.write_u32(node.id().0)?;
        self.w.write_u16(node.kind().code())?;

        self.w.write_u16(node.attrs().len() as u16)?;
        for (attr, value) in node.attrs() {
            self.w.write_u16(attr.code())?;
            self.w.write_u8(value.tag())?;
            match *value {
                Value::Bool(b) => self.w.write_u8(u8::from(b))?,
                Value::Int(i) => self.w.write_i64(i)?,
                Value::Str(key) => {
                    self.keys.insert(key);
                    self.w.write_u32(key.0)?;
                }
            }
        }

        self.w.write_u32(node.edges().len() as u32)?;
        for (edge, target) in node.edges() {
            self.w.write_u16(edge.code())?;
            self.w.write_u32(target.0)?;
        }
        Ok(())
    }
}

impl<S: Schema, W: Write> Visitor<S> for NodeWriter<'_, W> {
    fn visit(&mut self, _cx: &VisitContext<'_, S>, node: &Node<S>) -> VisitFlow {
        match self.write_node(node) {
            Ok(()) => VisitFlow::Continue,
            Err(e) => {
                self.error = Some(e);
                VisitFlow::Stop
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Replaces the contents of `factory` with the graph in `reader`.
///
/// Blocks found in the file are added to `header`; a kind `header` already
/// holds fails with `HeaderDataAlreadyLoaded`. On any error both `factory`
/// and `header` are left as they were. Reverse edges are disabled
/// afterwards.
pub fn load_from<S, R>(
    factory: &mut Factory<S>,
    mut reader: R,
    header: &mut Header,
) -> Result<(), StorageError>
where
    S: Schema,
    R: Read,
{
    if read_magic(&mut reader)? {
        read_body(factory, FrameDecoder::new(reader), header)
    } else {
        read_body(factory, reader, header)
    }
}

/// Reads and validates only the header of a graph stream.
pub fn read_header<S, R>(mut reader: R) -> Result<Header, StorageError>
where
    S: Schema,
    R: Read,
{
    let mut header = Header::new();
    if read_magic(&mut reader)? {
        let mut r = BinaryReader::new(FrameDecoder::new(reader));
        header.absorb(read_checked_header::<S, _>(&mut r)?)?;
    } else {
        let mut r = BinaryReader::new(reader);
        header.absorb(read_checked_header::<S, _>(&mut r)?)?;
    }
    Ok(header)
}

/// Returns whether the stream is compressed.
fn read_magic<R: Read>(reader: &mut R) -> Result<bool, StorageError> {
    let mut magic = [0u8; 4];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(StorageError::MissingFileTypeInfo)
        }
        Err(e) => return Err(e.into()),
    }
    match &magic {
        MAGIC_PLAIN => Ok(false),
        MAGIC_ZIPPED => Ok(true),
        _ => Err(StorageError::MissingFileTypeInfo),
    }
}

fn read_checked_header<S: Schema, R: Read>(
    r: &mut BinaryReader<R>,
) -> Result<Header, StorageError> {
    let loaded = Header::read(r)?;
    loaded
        .identity()
        .ok_or(StorageError::MissingVersionInfo)?
        .check::<S>()?;
    Ok(loaded)
}

fn read_body<S: Schema, R: Read>(
    factory: &mut Factory<S>,
    reader: R,
    header: &mut Header,
) -> Result<(), StorageError> {
    let mut r = BinaryReader::new(reader);
    let loaded = read_checked_header::<S, _>(&mut r)?;
    let mut blocks = header.clone();
    blocks.absorb(loaded)?;

    // Decode into a scratch graph so a failure leaves `factory` untouched.
    let mut scratch = Factory::with_strings(factory.strings().clone());
    scratch.clear();
    read_nodes(&mut scratch, &mut r)?;
    let keys = scratch.strings_mut().load_merge(&mut r)?;
    scratch.remap_keys(&keys);
    scratch.finish_restore()?;

    factory.adopt(scratch);
    *header = blocks;
    tracing::info!(
        language = S::LANGUAGE,
        nodes = factory.node_count(),
        "graph loaded"
    );
    Ok(())
}

fn read_nodes<S: Schema, R: Read>(
    factory: &mut Factory<S>,
    r: &mut BinaryReader<R>,
) -> Result<(), StorageError> {
    loop {
        let id = NodeId(r.read_u32()?);
        let code = r.read_u16()?;
        if id == NodeId::INVALID && code == 0 {
            return Ok(());
        }
        if id.0 > MAX_NODE_ID {
            return Err(StorageError::Corrupt {
                reason: format!("node id {id} exceeds the limit of {MAX_NODE_ID}"),
            });
        }
        let kind = S::Kind::from_code(code).ok_or(StorageError::InvalidNodeKind { code })?;
        factory.create_node_at(kind, id)?;

        let attr_count = r.read_u16()?;
        for _ in 0..attr_count {
            let code = r.read_u16()?;
            let attr = S::Attr::from_code(code).ok_or(StorageError::InvalidAttrKind { code })?;
            let value = match r.read_u8()? {
                1 => Value::Bool(r.read_u8()? != 0),
                2 => Value::Int(r.read_i64()?),
                3 => Value::Str(Key(r.read_u32()?)),
                tag => {
                    return Err(StorageError::Corrupt {
                        reason: format!("node {id}: unknown value tag {tag}"),
                    })
                }
            };
            factory.get_mut(id)?.set_attr(attr, value);
        }

        let edge_count = r.read_u32()?;
        for _ in 0..edge_count {
            let code = r.read_u16()?;
            let edge = S::Edge::from_code(code).ok_or(StorageError::InvalidEdgeKind { code })?;
            let target = NodeId(r.read_u32()?);
            factory.restore_edge(id, edge, target)?;
        }
    }
}
