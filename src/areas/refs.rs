//! Git references (HEAD and branches)
//!
//! References are text files under `.git` holding either a 40-character
//! object id or `ref: <path>` for a symbolic reference. Refs missing as loose
//! files are looked up in `packed-refs`, which is never written.

use crate::artifacts::branch::HEADS_PREFIX;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::TrackerError;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SYMREF_REGEX: &str = r"^ref: (.+)$";
const PACKED_REFS: &str = "packed-refs";

/// Bound on symbolic indirection, as a guard against ref cycles
const MAX_SYMREF_DEPTH: usize = 8;

#[derive(Debug, Clone, new)]
pub struct Refs {
    /// Path to the git directory
    path: Box<Path>,
}

#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef { sym_ref_name: SymRefName },
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read_symref_or_oid(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read ref file {}", path.display()))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(SymRefOrOid::SymRef {
                sym_ref_name: SymRefName::new(symref_match[1].to_string()),
            }))
        } else {
            Ok(Some(SymRefOrOid::Oid(ObjectId::try_parse(content)?)))
        }
    }
}

impl Refs {
    /// Last symbolic ref in the chain starting at HEAD. A detached HEAD
    /// resolves to `HEAD` itself.
    pub fn current_ref(&self) -> anyhow::Result<SymRefName> {
        let mut current = SymRefName::head();

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read_symref_or_oid(&self.ref_path(&current))? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        Err(anyhow::anyhow!("Symbolic ref chain from HEAD is too deep"))
    }

    /// Short name of the checked-out branch; `None` when HEAD is detached
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .current_ref()?
            .branch_short_name()
            .map(ToString::to_string))
    }

    /// Commit HEAD points at; `None` on an unborn branch
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_oid(&SymRefName::head())
    }

    pub fn read_branch(&self, branch_name: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        self.read_oid(&branch_name.to_sym_ref_name())
    }

    fn read_oid(&self, sym_ref_name: &SymRefName) -> anyhow::Result<Option<ObjectId>> {
        let mut current = sym_ref_name.clone();

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read_symref_or_oid(&self.ref_path(&current))? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                Some(SymRefOrOid::Oid(oid)) => return Ok(Some(oid)),
                None => return Ok(self.packed_refs()?.get(current.as_ref_path()).copied()),
            }
        }

        Err(anyhow::anyhow!(
            "Symbolic ref chain from {} is too deep",
            sym_ref_name.as_ref_path()
        ))
    }

    /// Move the branch HEAD is on (or HEAD itself when detached) to `oid`,
    /// creating the branch file on an unborn branch.
    pub fn update_head(&self, oid: ObjectId) -> anyhow::Result<()> {
        let target = self.current_ref()?;
        self.update_ref_file(&self.ref_path(&target), &format!("{oid}\n"))?;

        tracing::debug!(target = %target.as_ref_path(), oid = %oid, "updated ref");
        Ok(())
    }

    /// Point HEAD at `branch_name` symbolically.
    pub fn set_head(&self, branch_name: &BranchName) -> anyhow::Result<()> {
        self.update_ref_file(
            &self.head_path(),
            &format!("ref: {}\n", branch_name.to_sym_ref_name().as_ref_path()),
        )
    }

    pub fn branch_exists(&self, branch_name: &BranchName) -> anyhow::Result<bool> {
        let sym_ref_name = branch_name.to_sym_ref_name();

        Ok(self.ref_path(&sym_ref_name).is_file()
            || self.packed_refs()?.contains_key(sym_ref_name.as_ref_path()))
    }

    pub fn create_branch(&self, branch_name: &BranchName, source_oid: ObjectId) -> anyhow::Result<()> {
        if self.branch_exists(branch_name)? {
            return Err(TrackerError::BranchExists(branch_name.to_string()).into());
        }

        let branch_path = self.ref_path(&branch_name.to_sym_ref_name());
        self.update_ref_file(&branch_path, &format!("{source_oid}\n"))
    }

    /// Local branch short names, loose and packed, sorted
    pub fn list_branches(&self) -> anyhow::Result<Vec<String>> {
        let heads_path = self.heads_path();

        let loose = WalkDir::new(&heads_path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&heads_path).ok()?;
                let parts = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>();
                Some(parts.join("/"))
            });

        let packed = self
            .packed_refs()?
            .into_keys()
            .filter_map(|name| name.strip_prefix(HEADS_PREFIX).map(ToString::to_string));

        Ok(loose.chain(packed).collect::<BTreeSet<_>>().into_iter().collect())
    }

    /// `packed-refs` as ref path to object id. Peeled (`^`) lines and
    /// comments are skipped.
    fn packed_refs(&self) -> anyhow::Result<BTreeMap<String, ObjectId>> {
        let packed_path = self.path.join(PACKED_REFS);
        if !packed_path.is_file() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&packed_path)
            .with_context(|| format!("Unable to read {}", packed_path.display()))?;

        Ok(content
            .lines()
            .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
            .filter_map(|line| {
                let (oid, name) = line.split_once(' ')?;
                Some((name.trim().to_string(), ObjectId::try_parse(oid).ok()?))
            })
            .collect())
    }

    fn update_ref_file(&self, path: &Path, raw_ref: &str) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .with_context(|| format!("Invalid ref path {}", path.display()))?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create ref directory {}", parent.display()))?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Unable to open ref file {}", path.display()))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)
            .with_context(|| format!("Unable to lock ref file {}", path.display()))?;
        lock.deref_mut().write_all(raw_ref.as_bytes())?;

        Ok(())
    }

    fn ref_path(&self, sym_ref_name: &SymRefName) -> PathBuf {
        sym_ref_name
            .as_ref_path()
            .split('/')
            .fold(self.path.to_path_buf(), |acc, part| acc.join(part))
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join("HEAD")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.path.join("refs").join("heads")
    }
}
