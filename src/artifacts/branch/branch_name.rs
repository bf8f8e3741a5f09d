use crate::artifacts::branch::{HEADS_PREFIX, INVALID_BRANCH_NAME_REGEX};
use crate::errors::TrackerError;
use anyhow::Context;
use derive_new::new;

/// A ref path relative to `.git`, e.g. `HEAD` or `refs/heads/master`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, new)]
pub struct SymRefName(String);

impl SymRefName {
    pub fn head() -> Self {
        SymRefName("HEAD".to_string())
    }

    pub fn as_ref_path(&self) -> &str {
        &self.0
    }

    /// Branch short name for `refs/heads/*` refs
    pub fn branch_short_name(&self) -> Option<&str> {
        self.0.strip_prefix(HEADS_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TrackerError::InvalidBranchName(name).into());
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .with_context(|| format!("invalid branch name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

        if re.is_match(&name) {
            Err(TrackerError::InvalidBranchName(name).into())
        } else {
            Ok(Self(name))
        }
    }

    pub fn to_sym_ref_name(&self) -> SymRefName {
        SymRefName(format!("{HEADS_PREFIX}{}", self.0))
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn alphanumeric_names_are_valid(branch_name in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(branch_name).is_ok());
        }

        #[test]
        fn hierarchical_names_are_valid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}/{suffix}")).is_ok());
        }

        #[test]
        fn names_starting_with_a_dot_are_invalid(suffix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!(".{suffix}")).is_err());
        }

        #[test]
        fn names_ending_with_lock_are_invalid(prefix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!("{prefix}.lock")).is_err());
        }

        #[test]
        fn consecutive_dots_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}..{suffix}")).is_err());
        }

        #[test]
        fn reflog_syntax_is_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}@{{{suffix}}}")).is_err());
        }

        #[test]
        fn special_characters_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special_char in r"[\*:\?\[\\^~ ]"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}{special_char}{suffix}")).is_err());
        }
    }

    #[test]
    fn empty_name_is_reported_as_invalid_branch_name() {
        let error = BranchName::try_parse("").unwrap_err();

        assert!(matches!(
            error.downcast_ref::<TrackerError>(),
            Some(TrackerError::InvalidBranchName(_))
        ));
    }

    #[test]
    fn branch_maps_to_its_heads_ref() {
        let branch = BranchName::try_parse("feature/login").unwrap();

        assert_eq!(branch.to_sym_ref_name().as_ref_path(), "refs/heads/feature/login");
        assert_eq!(branch.to_sym_ref_name().branch_short_name(), Some("feature/login"));
    }
}
