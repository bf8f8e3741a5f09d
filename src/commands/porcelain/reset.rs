use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};

impl Repository {
    /// Reset the index entries of `paths` (and of everything below them) to
    /// HEAD. Paths HEAD does not know are dropped from the index.
    ///
    /// Restored entries carry no stat data, so the next status compares
    /// their content.
    pub async fn unstage(&self, paths: &[String]) -> anyhow::Result<()> {
        let head_tree = self.head_tree()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        for path in paths {
            let prefix = format!("{path}/");
            let mut targets = index.paths_under(path);
            targets.extend(
                head_tree
                    .keys()
                    .filter(|head_path| *head_path == path || head_path.starts_with(&prefix))
                    .cloned(),
            );
            targets.sort();
            targets.dedup();

            for target in targets {
                match head_tree.get(&target) {
                    Some(head_entry) => {
                        let metadata = EntryMetadata {
                            mode: head_entry.mode,
                            ..Default::default()
                        };
                        index.add(IndexEntry::new(target.clone(), head_entry.oid, metadata));
                    }
                    None => index.remove(&target),
                }

                tracing::debug!(path = %target, "unstaged");
            }
        }

        index.write_updates()
    }
}
