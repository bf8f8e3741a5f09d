//! Per-area change kinds and the decision table combining them

use crate::artifacts::status::file_status::FileStatus;

/// Working directory compared with the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WorkspaceChangeType {
    #[default]
    None,
    Untracked,
    Modified,
    Deleted,
}

/// Index compared with the committed tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum IndexChangeType {
    #[default]
    None,
    Added,
    Modified,
    Deleted,
}

/// Everything known about one path, as gathered from the three areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileChange {
    pub(crate) workspace_change: WorkspaceChangeType,
    pub(crate) index_change: IndexChangeType,
    /// The index holds a stage 1-3 entry for the path
    pub(crate) conflicted: bool,
    /// A stage 0 index entry exists
    pub(crate) in_index: bool,
    /// A non-directory exists in the working directory
    pub(crate) in_workspace: bool,
}

impl FileChange {
    /// Apply the decision table. First match wins; `is_ignored` is only
    /// consulted for untracked files.
    pub fn status(&self, is_ignored: impl FnOnce() -> bool) -> FileStatus {
        if self.conflicted {
            return FileStatus::Conflict;
        }

        if self.in_index {
            return match (self.index_change, self.workspace_change) {
                (IndexChangeType::Added, _) => FileStatus::Added,
                (_, WorkspaceChangeType::Deleted) => FileStatus::Deleted,
                (_, WorkspaceChangeType::Modified) => FileStatus::Modified,
                (IndexChangeType::Modified, _) => FileStatus::Staged,
                _ => FileStatus::Tracked,
            };
        }

        if self.index_change == IndexChangeType::Deleted {
            return FileStatus::Removed;
        }

        if self.in_workspace {
            return if is_ignored() {
                FileStatus::Ignored
            } else {
                FileStatus::New
            };
        }

        FileStatus::NotControlled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn tracked(index_change: IndexChangeType, workspace_change: WorkspaceChangeType) -> FileChange {
        FileChange {
            index_change,
            workspace_change,
            in_index: true,
            in_workspace: workspace_change != WorkspaceChangeType::Deleted,
            conflicted: false,
        }
    }

    #[rstest]
    #[case(IndexChangeType::Added, WorkspaceChangeType::Deleted, FileStatus::Added)]
    #[case(IndexChangeType::Added, WorkspaceChangeType::Modified, FileStatus::Added)]
    #[case(IndexChangeType::Modified, WorkspaceChangeType::Deleted, FileStatus::Deleted)]
    #[case(IndexChangeType::Modified, WorkspaceChangeType::Modified, FileStatus::Modified)]
    #[case(IndexChangeType::Modified, WorkspaceChangeType::None, FileStatus::Staged)]
    #[case(IndexChangeType::None, WorkspaceChangeType::None, FileStatus::Tracked)]
    fn indexed_paths_follow_the_table(
        #[case] index_change: IndexChangeType,
        #[case] workspace_change: WorkspaceChangeType,
        #[case] expected: FileStatus,
    ) {
        assert_eq!(tracked(index_change, workspace_change).status(|| false), expected);
    }

    #[test]
    fn conflict_wins_over_everything_else() {
        let change = FileChange {
            conflicted: true,
            ..tracked(IndexChangeType::Added, WorkspaceChangeType::Deleted)
        };

        assert_eq!(change.status(|| true), FileStatus::Conflict);
    }

    #[test]
    fn committed_file_missing_from_index_is_removed_even_if_on_disk() {
        let change = FileChange {
            index_change: IndexChangeType::Deleted,
            workspace_change: WorkspaceChangeType::Untracked,
            in_workspace: true,
            ..Default::default()
        };

        assert_eq!(change.status(|| false), FileStatus::Removed);
    }

    #[rstest]
    #[case(true, FileStatus::Ignored)]
    #[case(false, FileStatus::New)]
    fn untracked_files_consult_the_ignore_rules(#[case] ignored: bool, #[case] expected: FileStatus) {
        let change = FileChange {
            workspace_change: WorkspaceChangeType::Untracked,
            in_workspace: true,
            ..Default::default()
        };

        assert_eq!(change.status(|| ignored), expected);
    }

    #[test]
    fn unknown_paths_are_not_controlled() {
        let ignore_rules_consulted = std::cell::Cell::new(false);
        let status = FileChange::default().status(|| {
            ignore_rules_consulted.set(true);
            true
        });

        assert_eq!(status, FileStatus::NotControlled);
        assert!(!ignore_rules_consulted.get());
    }
}
