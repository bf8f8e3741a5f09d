//! Unified patches between a committed blob and its working copy

use anyhow::Context;
use similar::TextDiff;
use std::io::Write;
use std::path::PathBuf;

const CONTEXT_RADIUS: usize = 3;
const NULL_PATH: &str = "/dev/null";

/// Render a Git-style unified patch for `path`. `None` stands for a side
/// where the file does not exist. Content that is not valid UTF-8 or that
/// contains NUL bytes is reported as binary.
pub fn unified_patch(path: &str, old: Option<&[u8]>, new: Option<&[u8]>) -> String {
    let old_label = old.map_or_else(|| NULL_PATH.to_string(), |_| format!("a/{path}"));
    let new_label = new.map_or_else(|| NULL_PATH.to_string(), |_| format!("b/{path}"));

    let mut patch = format!("diff --git a/{path} b/{path}\n");
    let old = old.unwrap_or_default();
    let new = new.unwrap_or_default();

    if old == new {
        return String::new();
    }

    match (as_text(old), as_text(new)) {
        (Some(old_text), Some(new_text)) => {
            let diff = TextDiff::from_lines(old_text, new_text);
            let body = diff
                .unified_diff()
                .context_radius(CONTEXT_RADIUS)
                .header(&old_label, &new_label)
                .to_string();
            patch.push_str(&body);
        }
        _ => {
            patch.push_str(&format!("Binary files {old_label} and {new_label} differ\n"));
        }
    }

    patch
}

/// Persist `patch` to a temporary `.diff` file that outlives this process.
pub fn write_patch_file(patch: &str) -> anyhow::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("gtrack-")
        .suffix(".diff")
        .tempfile()
        .context("Unable to create patch file")?;

    file.write_all(patch.as_bytes())
        .context("Unable to write patch file")?;

    let (_, path) = file.keep().context("Unable to keep patch file")?;
    Ok(path)
}

fn as_text(content: &[u8]) -> Option<&str> {
    if content.contains(&0) {
        return None;
    }

    std::str::from_utf8(content).ok()
}
