//! Git commit object
//!
//! ## Format
//!
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```
//!
//! Commits written by other tools may carry further headers (`encoding`,
//! `gpgsig` with continuation lines, ...). Those are skipped when reading.

use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::config::Identity;
use anyhow::Context;
use bytes::Bytes;
use std::io::BufRead;

const SIGN_OFF_PREFIX: &str = "Signed-off-by:";

/// Author or committer: name, email and a timestamp with timezone
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl Author {
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    /// Author for a new commit. `GIT_AUTHOR_DATE` pins the timestamp, in
    /// either RFC 2822 or `%Y-%m-%d %H:%M:%S %z` form.
    pub fn from_identity(identity: &Identity) -> Self {
        let timestamp = std::env::var("GIT_AUTHOR_DATE").ok().and_then(|date_str| {
            chrono::DateTime::parse_from_rfc2822(&date_str)
                .or_else(|_| chrono::DateTime::parse_from_str(&date_str, "%Y-%m-%d %H:%M:%S %z"))
                .ok()
        });

        match timestamp {
            Some(ts) => Author::new_with_timestamp(identity.name.clone(), identity.email.clone(), ts),
            None => Author::new(identity.name.clone(), identity.email.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// `Name <email> timestamp timezone`
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // split from the right: the name may contain spaces
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(anyhow::anyhow!("Invalid author format"));
        }

        let timezone = parts[0];
        let timestamp = parts[1]
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("Invalid timestamp"))?;
        let name_email_part = parts[2];

        let email_start = name_email_part
            .find('<')
            .ok_or_else(|| anyhow::anyhow!("Invalid author format: missing '<'"))?;
        let email_end = name_email_part
            .rfind('>')
            .ok_or_else(|| anyhow::anyhow!("Invalid author format: missing '>'"))?;

        let name = name_email_part[..email_start].trim().to_string();
        let email = name_email_part[email_start + 1..email_end].to_string();

        let offset = parse_timezone(timezone)?;
        let datetime = chrono::DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?
            .with_timezone(&offset);

        Ok(Author {
            name,
            email,
            timestamp: datetime,
        })
    }
}

fn parse_timezone(timezone: &str) -> anyhow::Result<chrono::FixedOffset> {
    let invalid = || anyhow::anyhow!("Invalid timezone {timezone}");

    let (sign, digits) = match timezone.split_at_checked(1) {
        Some(("+", digits)) => (1, digits),
        Some(("-", digits)) => (-1, digits),
        _ => return Err(invalid()),
    };
    if digits.len() != 4 {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;

    chrono::FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Append a `Signed-off-by` trailer for `identity` unless the message
/// already ends with it.
pub fn sign_off(message: &str, identity: &Identity) -> String {
    let trailer = format!("{SIGN_OFF_PREFIX} {} <{}>", identity.name, identity.email);
    let message = message.trim_end();

    if message.lines().any(|line| line.trim() == trailer) {
        return message.to_string();
    }

    let last_line_is_trailer = message
        .lines()
        .last()
        .is_some_and(|line| line.starts_with(SIGN_OFF_PREFIX));

    if last_line_is_trailer {
        format!("{message}\n{trailer}")
    } else {
        format!("{message}\n\n{trailer}")
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Parent commit IDs (empty for the root commit)
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    message: String,
}

impl Commit {
    pub fn new(parents: Vec<ObjectId>, tree_oid: ObjectId, author: Author, message: String) -> Self {
        Commit {
            parents,
            tree_oid,
            author: author.clone(),
            committer: author,
            message,
        }
    }

    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        for parent in &self.parents {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.to_string());

        let mut content = lines.join("\n");
        if !content.ends_with('\n') {
            content.push('\n');
        }

        frame(self.object_type(), content.as_bytes())
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        let content = String::from_utf8_lossy(&content);

        let (headers, message) = content
            .split_once("\n\n")
            .unwrap_or((content.as_ref(), ""));

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            // continuation of a multi-line header such as gpgsig
            if line.starts_with(' ') {
                continue;
            }

            match line.split_once(' ') {
                Some(("tree", oid)) => tree_oid = Some(ObjectId::try_parse(oid)?),
                Some(("parent", oid)) => parents.push(ObjectId::try_parse(oid)?),
                Some(("author", value)) => author = Some(Author::try_from(value)?),
                Some(("committer", value)) => committer = Some(Author::try_from(value)?),
                _ => {}
            }
        }

        let tree_oid = tree_oid.context("Invalid commit object: missing tree line")?;
        let author = author.context("Invalid commit object: missing author line")?;
        let committer = committer.unwrap_or_else(|| author.clone());

        Ok(Commit {
            parents,
            tree_oid,
            author,
            committer,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    fn identity() -> Identity {
        Identity::new("Ada Lovelace".to_string(), "ada@example.com".to_string())
    }

    #[test]
    fn parses_commits_with_unknown_headers() {
        let raw = format!(
            "tree {TREE}\n\
             author Ada Lovelace <ada@example.com> 1700000000 +0200\n\
             committer Ada Lovelace <ada@example.com> 1700000000 +0200\n\
             encoding ISO-8859-1\n\
             gpgsig -----BEGIN PGP SIGNATURE-----\n \n abc\n -----END PGP SIGNATURE-----\n\
             \n\
             Subject line\n\nBody\n"
        );

        let commit = Commit::deserialize(std::io::Cursor::new(raw.into_bytes())).unwrap();

        assert_eq!(commit.tree_oid().to_string(), TREE);
        assert_eq!(commit.author().name(), "Ada Lovelace");
        assert_eq!(commit.author().timestamp().offset().local_minus_utc(), 7200);
        assert_eq!(commit.message(), "Subject line\n\nBody\n");
        assert_eq!(commit.short_message(), "Subject line");
    }

    #[test]
    fn serialized_commit_ends_with_a_newline() {
        let author = Author::try_from("Ada Lovelace <ada@example.com> 1700000000 +0000").unwrap();
        let commit = Commit::new(
            vec![],
            ObjectId::try_parse(TREE).unwrap(),
            author,
            "message".to_string(),
        );

        let bytes = commit.serialize().unwrap();
        assert!(bytes.ends_with(b"\n\nmessage\n"));
    }

    #[test]
    fn sign_off_appends_a_trailer_paragraph() {
        assert_eq!(
            sign_off("Fix parser\n", &identity()),
            "Fix parser\n\nSigned-off-by: Ada Lovelace <ada@example.com>"
        );
    }

    #[test]
    fn sign_off_is_not_duplicated() {
        let signed = sign_off("Fix parser", &identity());

        assert_eq!(sign_off(&signed, &identity()), signed);
    }

    #[test]
    fn sign_off_joins_an_existing_trailer_block() {
        let message = "Fix parser\n\nSigned-off-by: Grace Hopper <grace@example.com>";

        assert_eq!(
            sign_off(message, &identity()),
            format!("{message}\nSigned-off-by: Ada Lovelace <ada@example.com>")
        );
    }
}
