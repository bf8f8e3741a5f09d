use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn object_id(&self) -> Result<ObjectId> {
        Ok(ObjectId::hash_of(&self.serialize()?))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Frame `content` with the loose-object header of `object_type`.
pub fn frame(object_type: ObjectType, content: &[u8]) -> Result<Bytes> {
    let mut object_bytes = Vec::with_capacity(content.len() + 32);
    write!(object_bytes, "{} {}\0", object_type.as_str(), content.len())?;
    object_bytes.write_all(content)?;

    Ok(Bytes::from(object_bytes))
}
