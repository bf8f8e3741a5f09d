use crate::areas::ignore::IgnoreRules;
use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use std::collections::BTreeSet;

impl Repository {
    /// Stage `paths`: files on disk are stored as blobs and indexed, missing
    /// files are dropped from the index. A directory stages every file below
    /// it that is tracked or not ignored.
    pub async fn stage(&self, paths: &[String]) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let ignore_rules = IgnoreRules::load(self.path());

        for path in paths {
            let is_gitlink = index
                .entry_by_path(path)
                .is_some_and(|entry| entry.metadata.mode == EntryMode::Gitlink);

            match self.workspace().stat_file(path)? {
                Some(_) if is_gitlink => {
                    tracing::debug!(path = %path, "submodule left as is");
                }
                Some(stat) if stat.mode.is_tree() => {
                    let files = self.expand_directory(path, &index, &ignore_rules)?;

                    for tracked in index.paths_under(path) {
                        if !files.contains(&tracked) && self.workspace().stat_file(&tracked)?.is_none() {
                            index.remove(&tracked);
                        }
                    }

                    for file in files {
                        if let Some(stat) = self.workspace().stat_file(&file)?
                            && !stat.mode.is_tree()
                        {
                            self.stage_file(&mut index, &file, stat)?;
                        }
                    }
                }
                Some(stat) => self.stage_file(&mut index, path, stat)?,
                None => {
                    tracing::debug!(path = %path, "staging removal");
                    index.remove(path);
                }
            }
        }

        index.write_updates()
    }

    fn stage_file(&self, index: &mut Index, path: &str, stat: EntryMetadata) -> anyhow::Result<()> {
        let blob = self.workspace().parse_blob(path)?;
        let blob_id = self.database().store(&blob)?;

        tracing::debug!(path = %path, oid = %blob_id, "staged file");
        index.add(IndexEntry::new(path.to_string(), blob_id, stat));

        Ok(())
    }

    /// Files below `dir` worth staging; ignored directories are only
    /// entered when they hold tracked files.
    fn expand_directory(
        &self,
        dir: &str,
        index: &Index,
        ignore_rules: &IgnoreRules,
    ) -> anyhow::Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        let mut pending = vec![dir.to_string()];

        while let Some(current) = pending.pop() {
            for child in self.workspace().list_dir(&current)? {
                let Some(stat) = self.workspace().stat_file(&child)? else {
                    continue;
                };

                let is_dir = stat.mode.is_tree();
                if ignore_rules.is_ignored(&child, is_dir) && !index.is_tracked(&child) {
                    continue;
                }

                if is_dir && !index.is_tracked_file(&child) {
                    pending.push(child);
                } else {
                    files.insert(child);
                }
            }
        }

        Ok(files)
    }
}
