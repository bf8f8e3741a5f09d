//! Git blob object
//!
//! Blobs store file content as raw bytes, without name or mode (those live in
//! trees and the index). Content is never decoded: files in any encoding hash
//! to the same id native Git computes.

use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }
}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(self.object_type(), &self.content)
    }
}

impl Unpackable for Blob {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        // the header has already been read
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        Ok(Self::new(Bytes::from(content)))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }
}
