use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit, sign_off};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use crate::config::Identity;
use crate::errors::TrackerError;
use anyhow::Context;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Replace HEAD instead of adding a child commit
    pub amend: bool,
    /// Append a `Signed-off-by` trailer
    pub sign_off: bool,
}

impl Repository {
    /// Record the index as a new commit on the current branch.
    pub async fn commit(
        &self,
        message: &str,
        options: CommitOptions,
        identity: &Identity,
    ) -> anyhow::Result<ObjectId> {
        if message.trim().is_empty() {
            return Err(TrackerError::EmptyCommitMessage.into());
        }

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if index.has_conflicts() {
            return Err(TrackerError::UnresolvedConflicts.into());
        }

        let head = self.refs().read_head()?;
        let parents = match (options.amend, head) {
            (true, Some(head)) => self
                .database()
                .parse_object_as_commit(&head)?
                .with_context(|| format!("HEAD {head} is not a commit"))?
                .parents()
                .to_vec(),
            (true, None) => anyhow::bail!("Nothing to amend: the current branch has no commits"),
            (false, head) => head.into_iter().collect(),
        };

        let tree = Tree::build(index.entries())?;
        tree.traverse(&|tree: &Tree| self.database().store(tree).map(|_| ()))?;
        let tree_id = tree.object_id()?;

        let message = if options.sign_off {
            sign_off(message, identity)
        } else {
            message.trim_end().to_string()
        };

        let commit = Commit::new(parents, tree_id, Author::from_identity(identity), message);
        let commit_id = self.database().store(&commit)?;
        self.refs().update_head(commit_id)?;

        tracing::info!(
            oid = %commit_id.to_short_oid(),
            amend = options.amend,
            summary = %commit.short_message(),
            "created commit"
        );
        Ok(commit_id)
    }

    /// Full message of the HEAD commit
    pub fn last_commit_message(&self) -> anyhow::Result<Option<String>> {
        let Some(head) = self.refs().read_head()? else {
            return Ok(None);
        };

        Ok(self
            .database()
            .parse_object_as_commit(&head)?
            .map(|commit| commit.message().trim_end().to_string()))
    }
}
