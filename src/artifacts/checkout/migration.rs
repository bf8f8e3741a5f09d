//! Checkout migration and conflict detection
//!
//! Moving from one commit to another:
//!
//! 1. The tree diff between the current and target commits lists the blobs
//!    that change.
//! 2. Each change is checked against the index and the working directory;
//!    local modifications or untracked files in the way are conflicts.
//! 3. Only when no conflict was found are the working directory and the
//!    index updated.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::core::repo_path;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{TreeChangeType, TreeDiff};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use crate::errors::TrackerError;
use anyhow::Context;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionType {
    Add,
    Delete,
    Modify,
}

/// Planned actions by type, each a path and its target entry
pub type ActionsSet = BTreeMap<ActionType, Vec<(String, Option<DatabaseEntry>)>>;

pub type ConflictsSet = BTreeMap<ConflictType, Vec<String>>;

pub struct Migration<'r> {
    database: &'r Database,
    workspace: &'r Workspace,
    index: &'r mut Index,
    tree_diff: TreeDiff<'r>,
    actions: ActionsSet,
    conflicts: ConflictsSet,
    mkdirs: BTreeSet<String>,
    rmdirs: BTreeSet<String>,
}

impl<'r> Migration<'r> {
    pub fn new(
        database: &'r Database,
        workspace: &'r Workspace,
        index: &'r mut Index,
        tree_diff: TreeDiff<'r>,
    ) -> Self {
        Self {
            database,
            workspace,
            index,
            tree_diff,
            actions: ActionsSet::new(),
            conflicts: ConflictsSet::new(),
            mkdirs: BTreeSet::new(),
            rmdirs: BTreeSet::new(),
        }
    }

    pub fn actions(&self) -> &ActionsSet {
        &self.actions
    }

    pub fn mkdirs(&self) -> &BTreeSet<String> {
        &self.mkdirs
    }

    pub fn rmdirs(&self) -> &BTreeSet<String> {
        &self.rmdirs
    }

    pub fn apply_changes(&mut self) -> anyhow::Result<()> {
        self.plan_changes()?;
        self.workspace.apply_migration(self)?;
        self.update_index()?;

        tracing::debug!(
            changes = self.tree_diff.changes().len(),
            "applied checkout migration"
        );
        Ok(())
    }

    fn plan_changes(&mut self) -> anyhow::Result<()> {
        let changes = self
            .tree_diff
            .changes()
            .iter()
            .map(|(path, change)| (path.clone(), change.clone()))
            .collect::<Vec<_>>();

        for (path, change) in &changes {
            self.check_for_conflict(path, change)?;
            self.record_change(path, change);
        }

        let errors = self.collect_errors();
        if !errors.is_empty() {
            return Err(TrackerError::CheckoutConflict(errors.join("\n\n")).into());
        }

        Ok(())
    }

    fn collect_errors(&self) -> Vec<String> {
        self.conflicts
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(conflict_type, paths)| {
                let paths = paths
                    .iter()
                    .map(|path| format!("\t{path}"))
                    .collect::<Vec<_>>()
                    .join("\n");

                let ConflictMessage { header, footer } = conflict_type.into();
                format!("{header}\n{paths}\n{footer}")
            })
            .collect()
    }

    fn check_for_conflict(&mut self, path: &str, change: &TreeChangeType) -> anyhow::Result<()> {
        let inspector = Inspector::new(self.workspace, self.index.mtime());
        let entry = self.index.entry_by_path(path);
        let (old_entry, new_entry) = (change.old_entry(), change.new_entry());

        if self.index.is_conflicted(path)
            || Self::index_differs_from_trees(&inspector, entry, old_entry, new_entry)
        {
            self.conflicts
                .entry(ConflictType::StaleFile)
                .or_default()
                .push(path.to_string());
            return Ok(());
        }

        let stat = self.workspace.stat_file(path)?;
        let conflict_type = ConflictType::get_conflict_type(stat.as_ref(), entry, new_entry);

        let conflicting = match &stat {
            Some(stat) if stat.mode.is_tree() => inspector
                .is_trackable(path, stat, &*self.index)?
                .then(|| path.to_string()),
            Some(stat) => (inspector.check_index_against_workspace(entry, Some(stat), path)?
                != WorkspaceChangeType::None)
                .then(|| path.to_string()),
            None => self.untracked_parent(&inspector, path)?.map(|parent| {
                if entry.is_some() {
                    path.to_string()
                } else {
                    parent
                }
            }),
        };

        if let Some(conflicting) = conflicting {
            self.conflicts
                .entry(conflict_type)
                .or_default()
                .push(conflicting);
        }

        Ok(())
    }

    /// A parent directory of `path` that is an untracked file on disk
    fn untracked_parent(&self, inspector: &Inspector, path: &str) -> anyhow::Result<Option<String>> {
        for parent in repo_path::parent_dirs(path).into_iter().rev() {
            if let Some(stat) = self.workspace.stat_file(parent)?
                && !stat.mode.is_tree()
                && inspector.is_trackable(parent, &stat, &*self.index)?
            {
                return Ok(Some(parent.to_string()));
            }
        }

        Ok(None)
    }

    /// The index matches neither side of the change, so it holds staged work.
    fn index_differs_from_trees(
        inspector: &Inspector,
        index_entry: Option<&IndexEntry>,
        old_entry: Option<&DatabaseEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> bool {
        inspector.check_index_against_head_tree(index_entry, old_entry) != IndexChangeType::None
            && inspector.check_index_against_head_tree(index_entry, new_entry)
                != IndexChangeType::None
    }

    fn record_change(&mut self, path: &str, change: &TreeChangeType) {
        let parents = repo_path::parent_dirs(path)
            .into_iter()
            .map(ToString::to_string);

        let (action, entry) = match change {
            TreeChangeType::Added(new_entry) => {
                self.mkdirs.extend(parents);
                (ActionType::Add, Some(*new_entry))
            }
            TreeChangeType::Deleted(_) => {
                self.rmdirs.extend(parents);
                (ActionType::Delete, None)
            }
            TreeChangeType::Modified { new, .. } => {
                self.mkdirs.extend(parents);
                (ActionType::Modify, Some(*new))
            }
        };

        self.actions
            .entry(action)
            .or_default()
            .push((path.to_string(), entry));
    }

    /// Deletions first, so a file replacing a directory is not dropped
    /// together with the directory's old children.
    fn update_index(&mut self) -> anyhow::Result<()> {
        for action in [ActionType::Delete, ActionType::Add, ActionType::Modify] {
            let Some(changes) = self.actions.get(&action) else {
                continue;
            };

            for (path, entry) in changes {
                match (action, entry) {
                    (ActionType::Delete, _) => self.index.remove(path),
                    (ActionType::Add | ActionType::Modify, Some(entry)) => {
                        let stat = self
                            .workspace
                            .stat_file(path)?
                            .with_context(|| format!("Checked out file {path} is missing"))?;
                        self.index.add(IndexEntry::new(path.clone(), entry.oid, stat));
                    }
                    (_, None) => {
                        return Err(anyhow::anyhow!("Missing target entry for {path}"));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn load_blob_data(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        self.database
            .load_blob(object_id)
            .with_context(|| format!("Unable to load blob {object_id} for checkout"))
    }
}
