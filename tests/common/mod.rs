#![allow(dead_code)]

pub mod command;
pub mod file;

use std::path::PathBuf;
use std::process::{Command, Stdio};

/// The `git` on `PATH`, if it runs.
pub fn native_git() -> Option<PathBuf> {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()
        .filter(|status| status.success())
        .map(|_| PathBuf::from("git"))
}

/// Bail out of a test that needs a native `git`.
#[macro_export]
macro_rules! require_git {
    () => {
        match common::native_git() {
            Some(git) => git,
            None => {
                eprintln!("git not found on PATH, skipping");
                return;
            }
        }
    };
}
