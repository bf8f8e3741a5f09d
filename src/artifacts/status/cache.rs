use crate::artifacts::core::repo_path;
use crate::artifacts::status::file_status::{FileStatus, GitFile};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Last known status per path, keyed case-insensitively
///
/// Every refresh starts a new generation: the cache is emptied and seeded
/// from the new scan. Statuses computed against an older repository state
/// carry that state's generation and are dropped on `put`. Single entries
/// are removed when a path is staged or unstaged.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: RwLock<Generation>,
}

#[derive(Debug, Default)]
struct Generation {
    id: u64,
    statuses: HashMap<String, FileStatus>,
}

impl StatusCache {
    pub fn generation(&self) -> u64 {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .id
    }

    pub fn get(&self, path: &str) -> Option<FileStatus> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .statuses
            .get(&repo_path::cache_key(path))
            .copied()
    }

    /// Store `status` if it was computed in the current generation.
    pub fn put(&self, generation: u64, path: &str, status: FileStatus) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.id != generation {
            return false;
        }

        entries.statuses.insert(repo_path::cache_key(path), status);
        true
    }

    /// Start generation `generation`, filled from a changed-files scan.
    /// Names that fold onto the same key (`TEST` and `test`) are left out and
    /// resolved on demand.
    pub fn reset(&self, generation: u64, files: &[GitFile]) {
        let mut seeded = HashMap::with_capacity(files.len());
        let mut collisions = Vec::new();

        for file in files {
            let key = repo_path::cache_key(&file.file_name);
            if seeded.insert(key.clone(), file.status).is_some() {
                collisions.push(key);
            }
        }
        for key in collisions {
            seeded.remove(&key);
        }

        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Generation {
            id: generation,
            statuses: seeded,
        };
    }

    pub fn invalidate(&self, path: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .statuses
            .remove(&repo_path::cache_key(path));
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .statuses
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
