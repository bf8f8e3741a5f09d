use derive_new::new;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Eq, PartialEq, new)]
pub struct FileSpec {
    pub path: PathBuf,
    pub content: String,
}

pub fn write_file(file_spec: FileSpec) {
    if let Some(parent) = file_spec.path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("Failed to create directory {:?}: {}", parent, e));
    }

    std::fs::write(&file_spec.path, &file_spec.content)
        .unwrap_or_else(|e| panic!("Failed to write file {:?}: {}", file_spec.path, e));
}

/// Files named and filled by `fake`, written directly under `dir`.
pub fn write_generated_files(dir: &Path, files_count: usize) -> Vec<FileSpec> {
    use fake::{
        Fake,
        faker::lorem::en::{Word, Words},
    };

    let mut names = std::collections::BTreeSet::new();
    while names.len() < files_count {
        names.insert(format!("{}.txt", Word().fake::<String>()));
    }

    names
        .into_iter()
        .map(|file_name| {
            let file_content = Words(5..10).fake::<Vec<String>>().join(" ");
            let file_spec = FileSpec::new(dir.join(file_name), file_content);
            write_file(file_spec.clone());

            file_spec
        })
        .collect()
}

/// Move the modification time of `path` into the past, so a rewrite of the
/// same size is never mistaken for an unchanged file.
pub fn backdate(path: &Path) {
    let past = SystemTime::now() - Duration::from_secs(60);
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(past))
        .unwrap_or_else(|e| panic!("Failed to backdate {:?}: {}", path, e));
}
