use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::checkout::migration::Migration;
use crate::errors::TrackerError;

impl Repository {
    /// Overwrite the working copy of `path` with its committed content.
    pub fn checkout_file(&self, path: &str) -> anyhow::Result<()> {
        let head_tree = self.head_tree()?;
        let entry = head_tree
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("{path} is not part of the last commit"))?;

        let data = self.database().load_blob(&entry.oid)?;
        self.workspace().write_file(path, &data, entry.mode)?;

        tracing::debug!(path = %path, oid = %entry.oid, "restored file from HEAD");
        Ok(())
    }

    /// Switch HEAD to branch `name`, migrating the working tree and the
    /// index from the current commit to the branch's commit. With `create`,
    /// the branch is first created at HEAD.
    ///
    /// Nothing is touched when local changes would be overwritten.
    pub async fn switch_branch(&self, name: &str, create: bool) -> anyhow::Result<()> {
        let branch_name = BranchName::try_parse(name)?;
        let current_oid = self.refs().read_head()?;

        if create {
            let source = current_oid.ok_or_else(|| {
                anyhow::anyhow!("Cannot create branch {branch_name}: the current branch has no commits")
            })?;
            self.refs().create_branch(&branch_name, source)?;
        }

        let target_oid = self
            .refs()
            .read_branch(&branch_name)?
            .ok_or_else(|| TrackerError::BranchNotFound(branch_name.to_string()))?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let tree_diff = self
            .database()
            .tree_diff(current_oid.as_ref(), Some(&target_oid))?;

        let mut migration = Migration::new(self.database(), self.workspace(), &mut index, tree_diff);
        migration.apply_changes()?;

        index.write_updates()?;
        self.refs().set_head(&branch_name)?;

        tracing::info!(branch = %branch_name, oid = %target_oid.to_short_oid(), "switched branch");
        Ok(())
    }
}
