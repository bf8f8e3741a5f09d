use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryFlags, EntryMetadata, IndexEntry};
use crate::artifacts::objects::object::Object;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use derive_new::new;

/// Compares one path across the areas
///
/// `index_mtime` is the modification time of the index file when it was
/// read; entries written in the same tick cannot be trusted on stat data
/// alone.
#[derive(Debug, new)]
pub struct Inspector<'r> {
    workspace: &'r Workspace,
    index_mtime: Option<(i64, i64)>,
}

impl<'r> Inspector<'r> {
    /// Whether `path` is, or contains, a file the index does not track.
    pub fn is_trackable(&self, path: &str, stat: &EntryMetadata, index: &Index) -> anyhow::Result<bool> {
        if !stat.mode.is_tree() {
            return Ok(!index.is_tracked_file(path));
        }

        for child in self.workspace.list_dir(path)? {
            if let Some(child_stat) = self.workspace.stat_file(&child)?
                && self.is_trackable(&child, &child_stat, index)?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Compare an index entry with the file at `working_path`.
    ///
    /// Size or mode mismatches are changes; matching stat and timestamps mean
    /// no change unless the entry is racy, in which case the content is
    /// hashed.
    pub fn check_index_against_workspace(
        &self,
        entry: Option<&IndexEntry>,
        stat: Option<&EntryMetadata>,
        working_path: &str,
    ) -> anyhow::Result<WorkspaceChangeType> {
        let Some(entry) = entry else {
            return Ok(WorkspaceChangeType::Untracked);
        };

        let stat = match stat {
            Some(stat) if stat.mode.is_tree() && entry.metadata.mode == EntryMode::Gitlink => {
                return Ok(WorkspaceChangeType::None);
            }
            Some(stat) if !stat.mode.is_tree() => stat,
            _ => return Ok(WorkspaceChangeType::Deleted),
        };

        if entry.metadata.flags.contains(EntryFlags::ASSUME_VALID) {
            return Ok(WorkspaceChangeType::None);
        }

        if !entry.stat_match(stat) {
            return Ok(WorkspaceChangeType::Modified);
        }

        if entry.times_match(stat) && !entry.is_racy(self.index_mtime) {
            return Ok(WorkspaceChangeType::None);
        }

        if self.is_content_changed(entry, working_path)? {
            Ok(WorkspaceChangeType::Modified)
        } else {
            Ok(WorkspaceChangeType::None)
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> IndexChangeType {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.metadata.mode
                    || head_entry.oid != index_entry.oid =>
            {
                IndexChangeType::Modified
            }
            (Some(_), None) => IndexChangeType::Added,
            (None, Some(_)) => IndexChangeType::Deleted,
            _ => IndexChangeType::None,
        }
    }

    fn is_content_changed(&self, index_entry: &IndexEntry, working_path: &str) -> anyhow::Result<bool> {
        let blob = self.workspace.parse_blob(working_path)?;
        let oid = blob.object_id()?;

        tracing::trace!(path = %working_path, "hashed working file");
        Ok(oid != index_entry.oid)
    }
}
