//! Reading file text back out of the CRDT document

use crate::error::DocumentError;
use crate::tree::identity::{decode, encode, NodeId, RepoPath};
use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, Map, MapRef, ReadTxn, Transact, TransactionMut, Update, Value};

/// Top-level map holding the directory hierarchy.
pub const ROOT_MAP: &str = "root";
/// Key of the text inside a file container.
pub const CONTENT_KEY: &str = "content";

/// Container map for `path`, following ancestor ids down from the root map.
pub(crate) fn find_container<T: ReadTxn>(txn: &T, path: &RepoPath) -> Option<MapRef> {
    let mut current = txn.get_map(ROOT_MAP)?;
    if path.is_root() {
        return Some(current);
    }
    for step in path.ancestors().iter().chain(std::iter::once(path)) {
        current = match current.get(txn, encode(step).as_str()) {
            Some(Value::YMap(map)) => map,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn read_text<T: ReadTxn>(txn: &T, id: &NodeId) -> Result<Option<String>, DocumentError> {
    let path = decode(id).map_err(|_| DocumentError::UnknownNode(id.to_string()))?;
    let container = match find_container(txn, &path) {
        Some(c) => c,
        None => return Ok(None),
    };
    match container.get(txn, CONTENT_KEY) {
        Some(Value::YText(text)) => Ok(Some(text.get_string(txn))),
        _ => Ok(None),
    }
}

pub(crate) fn apply_updates<B: AsRef<[u8]>>(
    txn: &mut TransactionMut,
    updates: &[B],
) -> Result<(), DocumentError> {
    for bytes in updates {
        let update = Update::decode_v1(bytes.as_ref())
            .map_err(|e| DocumentError::MalformedUpdate(e.to_string()))?;
        txn.apply_update(update);
    }
    Ok(())
}

/// A document rebuilt from encoded updates.
pub struct DocumentReader {
    doc: Doc,
}

impl DocumentReader {
    pub fn from_updates<B: AsRef<[u8]>>(updates: &[B]) -> Result<Self, DocumentError> {
        let doc = Doc::new();
        apply_updates(&mut doc.transact_mut(), updates)?;
        Ok(Self { doc })
    }

    /// Text of the file with this id, if the document has one.
    pub fn text(&self, id: &NodeId) -> Result<Option<String>, DocumentError> {
        let txn = self.doc.transact();
        read_text(&txn, id)
    }

    /// Whether a container exists for this id.
    pub fn contains(&self, id: &NodeId) -> bool {
        let txn = self.doc.transact();
        decode(id)
            .ok()
            .and_then(|path| find_container(&txn, &path))
            .is_some()
    }
}
