//! Git object identifier (SHA-1 hash)
//!
//! Object IDs are held as the raw 20 bytes of the digest and rendered as 40
//! lowercase hexadecimal characters.
//!
//! ## Storage
//!
//! Objects are stored in `.git/objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{OBJECT_ID_BYTES, OBJECT_ID_LENGTH, SHORT_OBJECT_ID_LENGTH};
use sha1::{Digest, Sha1};
use std::io;
use std::path::PathBuf;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_BYTES]);

impl ObjectId {
    /// SHA-1 of an already framed object
    pub fn hash_of(data: &[u8]) -> Self {
        let digest = Sha1::digest(data);
        let mut bytes = [0u8; OBJECT_ID_BYTES];
        bytes.copy_from_slice(digest.as_slice());

        ObjectId(bytes)
    }

    /// Parse and validate a 40-character hexadecimal object ID
    pub fn try_parse(id: &str) -> anyhow::Result<Self> {
        let id = id.trim();
        if id.len() != OBJECT_ID_LENGTH {
            return Err(anyhow::anyhow!("Invalid object ID length: {}", id.len()));
        }

        let mut bytes = [0u8; OBJECT_ID_BYTES];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&id[i * 2..i * 2 + 2], 16)
                .map_err(|_| anyhow::anyhow!("Invalid object ID characters: {id}"))?;
        }

        Ok(ObjectId(bytes))
    }

    pub fn from_bytes(raw: &[u8]) -> anyhow::Result<Self> {
        let bytes: [u8; OBJECT_ID_BYTES] = raw
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid binary object ID length: {}", raw.len()))?;

        Ok(ObjectId(bytes))
    }

    /// Write the 20 raw bytes, as tree and index entries store them
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    pub fn read_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut bytes = [0u8; OBJECT_ID_BYTES];
        reader.read_exact(&mut bytes)?;

        Ok(ObjectId(bytes))
    }

    /// Split the hash as `XX/YYYYYY...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_string();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    pub fn to_short_oid(&self) -> String {
        self.to_string()[..SHORT_OBJECT_ID_LENGTH].to_string()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // `git hash-object` of an empty blob
    const EMPTY_BLOB: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn hex_form_round_trips() {
        let oid = ObjectId::try_parse(EMPTY_BLOB).unwrap();

        assert_eq!(oid.to_string(), EMPTY_BLOB);
        assert_eq!(oid.to_short_oid(), "e69de29");
        assert_eq!(oid.to_path(), PathBuf::from("e6").join(&EMPTY_BLOB[2..]));
    }

    #[test]
    fn hashes_framed_objects_like_git() {
        assert_eq!(ObjectId::hash_of(b"blob 0\0").to_string(), EMPTY_BLOB);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(ObjectId::try_parse("abc").is_err());
        assert!(ObjectId::try_parse(&"z".repeat(OBJECT_ID_LENGTH)).is_err());
    }
}
