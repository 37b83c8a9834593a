//! A concrete `DocumentSource` for the admin tool. The spec treats the
//! upstream document fetcher as an opaque external collaborator producing
//! `(bookId, rawBytes)`; this adapter reads `<bookId>.txt` files from a
//! local directory so the bulk-ingest benchmark has something to drive
//! without depending on the real archive.

use alexandria_core::error::{Error, Result};
use std::path::PathBuf;

pub struct FileSystemDocumentSource {
    root: PathBuf,
}

impl FileSystemDocumentSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn fetch(&self, book_id: u64) -> Result<Vec<u8>> {
        let path = self.root.join(format!("{book_id}.txt"));
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("no source document for bookId {book_id} at {}", path.display()))
            } else {
                Error::Io(e)
            }
        })
    }
}
