//! Three-way status resolution
//!
//! A [`StatusSnapshot`] freezes the committed tree, the index and the ignore
//! rules as of the last refresh. The working directory is read live on every
//! query. Single paths are resolved directly; the whole tree is resolved with
//! one merge-join over the byte-sorted paths of the three areas.

use crate::areas::ignore::IgnoreRules;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::status::file_change::{FileChange, IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::file_status::{FileStatus, GitFile};
use crate::artifacts::status::inspector::Inspector;
use derive_new::new;
use std::collections::BTreeMap;
use std::iter::Peekable;

/// Committed blobs keyed by their full repository-relative path
pub type HeadTree = BTreeMap<String, DatabaseEntry>;
/// Working files keyed by their repository-relative path
pub type FileStatSet = BTreeMap<String, EntryMetadata>;

#[derive(Debug, new)]
pub struct StatusSnapshot {
    workspace: Workspace,
    head_tree: HeadTree,
    index: Index,
    ignore_rules: IgnoreRules,
}

impl StatusSnapshot {
    pub fn head_tree(&self) -> &HeadTree {
        &self.head_tree
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore_rules
    }

    /// Resolve a single normalized path.
    ///
    /// When neither the index nor the tree knows the exact path, a
    /// case-insensitive match among tracked paths stands in for it; the
    /// working file is likewise looked up exactly, then case-insensitively.
    pub fn resolve(&self, path: &str) -> anyhow::Result<FileStatus> {
        let name = self.tracked_name(path).unwrap_or(path);

        let working_path = self.workspace.locate(path)?;
        let stat = match &working_path {
            Some(working_path) => self.workspace.stat_file(working_path)?,
            None => None,
        };

        let change = self.file_change(name, stat.as_ref(), working_path.as_deref().unwrap_or(path))?;
        let status = change.status(|| self.ignore_rules.is_ignored(path, false));

        tracing::debug!(path = %path, tracked_as = %name, status = %status, "resolved path");
        Ok(status)
    }

    /// Resolve the whole working tree, returning every changed path in
    /// path order.
    pub fn resolve_all(&self) -> anyhow::Result<Vec<GitFile>> {
        let working_files = self
            .workspace
            .list_files(|dir| self.should_descend(dir))?;

        let paths = MergedPaths::new([
            Box::new(self.head_tree.keys().map(String::as_str)) as PathStream<'_>,
            Box::new(self.index.paths()) as PathStream<'_>,
            Box::new(working_files.keys().map(String::as_str)) as PathStream<'_>,
        ]);

        let mut changed = Vec::new();
        for path in paths {
            let change = self.file_change(path, working_files.get(path), path)?;
            let status = change.status(|| self.ignore_rules.is_ignored(path, false));

            if status.is_changed() {
                changed.push(GitFile::new(path.to_string(), status));
            }
        }

        tracing::debug!(
            changed = changed.len(),
            working_files = working_files.len(),
            "resolved working tree"
        );
        Ok(changed)
    }

    /// The name under which the index or the committed tree tracks `path`
    pub fn tracked_name<'s>(&'s self, path: &'s str) -> Option<&'s str> {
        if self.index.is_tracked_file(path) || self.head_tree.contains_key(path) {
            return Some(path);
        }

        let folded = path.to_lowercase();
        self.index
            .paths()
            .chain(self.head_tree.keys().map(String::as_str))
            .find(|candidate| candidate.to_lowercase() == folded)
    }

    fn file_change(
        &self,
        name: &str,
        stat: Option<&EntryMetadata>,
        working_path: &str,
    ) -> anyhow::Result<FileChange> {
        let inspector = Inspector::new(&self.workspace, self.index.mtime());
        let entry = self.index.entry_by_path(name);
        let conflicted = self.index.is_conflicted(name);

        let index_change = inspector.check_index_against_head_tree(entry, self.head_tree.get(name));
        let workspace_change = if conflicted || index_change == IndexChangeType::Added {
            WorkspaceChangeType::None
        } else {
            inspector.check_index_against_workspace(entry, stat, working_path)?
        };

        let in_workspace = stat.is_some_and(|stat| {
            !stat.mode.is_tree()
                || entry.is_some_and(|entry| entry.metadata.mode == EntryMode::Gitlink)
        });

        Ok(FileChange {
            workspace_change,
            index_change,
            conflicted,
            in_index: entry.is_some(),
            in_workspace,
        })
    }

    /// Ignored directories are skipped unless they hold tracked entries;
    /// submodule directories are never entered.
    fn should_descend(&self, dir: &str) -> bool {
        if self.index.is_tracked_file(dir) {
            return false;
        }

        !self.ignore_rules.is_ignored(dir, true) || self.index.is_tracked_directory(dir)
    }
}

type PathStream<'a> = Box<dyn Iterator<Item = &'a str> + 'a>;

/// Union of several byte-sorted path streams, each path yielded once
struct MergedPaths<'a, const N: usize> {
    streams: [Peekable<PathStream<'a>>; N],
}

impl<'a, const N: usize> MergedPaths<'a, N> {
    fn new(streams: [PathStream<'a>; N]) -> Self {
        MergedPaths {
            streams: streams.map(Iterator::peekable),
        }
    }
}

impl<'a, const N: usize> Iterator for MergedPaths<'a, N> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let smallest = self
            .streams
            .iter_mut()
            .filter_map(|stream| stream.peek().copied())
            .min()?;

        for stream in self.streams.iter_mut() {
            while stream.next_if(|path| *path == smallest).is_some() {}
        }

        Some(smallest)
    }
}
