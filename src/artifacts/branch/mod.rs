//! Branch names and symbolic references

pub mod branch_name;

/// Git's ref-name rules: no leading dot or slash, no `..`, `/.`, `@{`,
/// trailing slash or `.lock` suffix, no control or glob characters
pub const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// Prefix of local branch refs
pub const HEADS_PREFIX: &str = "refs/heads/";
