use crate::artifacts::index::CHECKSUM_SIZE;
use anyhow::anyhow;
use bytes::Bytes;
use file_guard::FileGuard;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};
use std::ops::DerefMut;

/// Hashing reader/writer over a locked index file
///
/// Every byte read or written goes through the SHA-1 digest so the trailer
/// can be produced or verified once the last entry is done.
#[derive(Debug)]
pub struct Checksum<'f> {
    file: FileGuard<&'f mut std::fs::File>,
    digest: Sha1,
    consumed: u64,
    length: u64,
}

impl<'f> Checksum<'f> {
    pub fn new(mut file: FileGuard<&'f mut std::fs::File>) -> anyhow::Result<Self> {
        let length = file.deref_mut().metadata()?.len();

        Ok(Checksum {
            file,
            digest: Sha1::new(),
            consumed: 0,
            length,
        })
    }

    /// Bytes left before the trailing checksum
    pub fn remaining_payload(&self) -> u64 {
        self.length
            .saturating_sub(self.consumed)
            .saturating_sub(CHECKSUM_SIZE as u64)
    }

    pub fn read(&mut self, size: usize) -> anyhow::Result<Bytes> {
        let mut buffer = vec![0; size];
        self.file
            .deref_mut()
            .read_exact(&mut buffer)
            .map_err(|_| anyhow!("Unexpected end-of-file while reading index"))?;

        self.digest.update(&buffer);
        self.consumed += size as u64;
        Ok(Bytes::from(buffer))
    }

    pub fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.file.deref_mut().write_all(data)?;
        self.digest.update(data);
        self.consumed += data.len() as u64;
        Ok(())
    }

    pub fn write_checksum(&mut self) -> anyhow::Result<()> {
        let checksum = self.digest.clone().finalize();
        self.file
            .deref_mut()
            .write_all(checksum.as_slice())
            .map_err(|_| anyhow!("Failed to write checksum to index file"))?;

        Ok(())
    }

    pub fn verify(&mut self) -> anyhow::Result<()> {
        let mut expected_checksum = [0u8; CHECKSUM_SIZE];
        self.file
            .deref_mut()
            .read_exact(&mut expected_checksum)
            .map_err(|_| anyhow!("Index file is missing its checksum"))?;

        let actual_checksum = self.digest.clone().finalize();

        if expected_checksum != actual_checksum.as_slice() {
            return Err(anyhow!("Checksum does not match value stored on disk"));
        }

        Ok(())
    }
}
