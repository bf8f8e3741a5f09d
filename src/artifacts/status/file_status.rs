//! File status values and the records handed to front ends

/// Status of a single path at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Outside a repository, or unknown to every area
    NotControlled,
    /// Untracked file in the working directory
    New,
    /// Unchanged since the last commit
    Tracked,
    /// Working content differs from the index
    Modified,
    /// Index differs from the last commit
    Staged,
    /// Deletion staged in the index
    Removed,
    /// New file staged in the index
    Added,
    /// Tracked file missing from the working directory
    Deleted,
    /// Unmerged entries in the index
    Conflict,
    /// Untracked file matched by an ignore rule
    Ignored,
    /// Staged rename (native backend only)
    Renamed,
    /// Staged copy (native backend only)
    Copied,
}

impl FileStatus {
    /// Whether the change sits in the index
    pub fn is_staged(&self) -> bool {
        matches!(
            self,
            FileStatus::Added
                | FileStatus::Staged
                | FileStatus::Removed
                | FileStatus::Renamed
                | FileStatus::Copied
        )
    }

    /// Whether the path is reported by the changed-files scan
    pub fn is_changed(&self) -> bool {
        !matches!(
            self,
            FileStatus::Tracked | FileStatus::NotControlled | FileStatus::Ignored
        )
    }

    /// Rank in the resolution order; a lower rank wins when two sources
    /// disagree about one path.
    pub fn precedence(&self) -> u8 {
        match self {
            FileStatus::Conflict => 0,
            FileStatus::Added | FileStatus::Renamed | FileStatus::Copied => 1,
            FileStatus::Deleted => 2,
            FileStatus::Modified => 3,
            FileStatus::Staged => 4,
            FileStatus::Tracked => 5,
            FileStatus::Removed => 6,
            FileStatus::Ignored | FileStatus::New => 7,
            FileStatus::NotControlled => 8,
        }
    }

    /// Short two-letter code in the style of `git status --short`
    pub fn short_code(&self) -> &'static str {
        match self {
            FileStatus::NotControlled | FileStatus::Tracked => "  ",
            FileStatus::New => "??",
            FileStatus::Ignored => "!!",
            FileStatus::Modified => " M",
            FileStatus::Staged => "M ",
            FileStatus::Removed => "D ",
            FileStatus::Added => "A ",
            FileStatus::Deleted => " D",
            FileStatus::Conflict => "UU",
            FileStatus::Renamed => "R ",
            FileStatus::Copied => "C ",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::NotControlled => "not controlled",
            FileStatus::New => "new",
            FileStatus::Tracked => "tracked",
            FileStatus::Modified => "modified",
            FileStatus::Staged => "staged",
            FileStatus::Removed => "removed",
            FileStatus::Added => "added",
            FileStatus::Deleted => "deleted",
            FileStatus::Conflict => "conflict",
            FileStatus::Ignored => "ignored",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A changed file as listed by the changed-files scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitFile {
    /// Repository-relative, `/`-separated path
    pub file_name: String,
    pub status: FileStatus,
    pub is_staged: bool,
    /// Selection state owned by the front end
    pub is_selected: bool,
}

impl GitFile {
    pub fn new(file_name: String, status: FileStatus) -> Self {
        GitFile {
            file_name,
            status,
            is_staged: status.is_staged(),
            is_selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(FileStatus::Added, true)]
    #[case(FileStatus::Staged, true)]
    #[case(FileStatus::Removed, true)]
    #[case(FileStatus::Renamed, true)]
    #[case(FileStatus::Modified, false)]
    #[case(FileStatus::Deleted, false)]
    #[case(FileStatus::New, false)]
    #[case(FileStatus::Conflict, false)]
    fn git_file_derives_its_staged_flag(#[case] status: FileStatus, #[case] staged: bool) {
        let file = GitFile::new("a.txt".to_string(), status);

        assert_eq!(file.is_staged, staged);
        assert!(!file.is_selected);
    }

    #[test]
    fn conflicts_outrank_everything() {
        let others = [
            FileStatus::Added,
            FileStatus::Deleted,
            FileStatus::Modified,
            FileStatus::Staged,
            FileStatus::Removed,
            FileStatus::New,
        ];

        assert!(others
            .iter()
            .all(|other| FileStatus::Conflict.precedence() < other.precedence()));
    }

    #[test]
    fn removal_outranks_an_untracked_copy() {
        assert!(FileStatus::Removed.precedence() < FileStatus::New.precedence());
    }
}
