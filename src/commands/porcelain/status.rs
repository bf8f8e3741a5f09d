//! Status listings for the command line

use crate::artifacts::status::file_status::{FileStatus, GitFile};
use colored::Colorize;
use std::io::Write;

/// One `XY path` line per file, in the order given.
pub fn render_porcelain(writer: &mut impl Write, files: &[GitFile]) -> anyhow::Result<()> {
    for file in files {
        writeln!(writer, "{} {}", file.status.short_code(), file.file_name)?;
    }

    Ok(())
}

/// Human-readable listing grouped into staged, unstaged, conflicted and
/// untracked files.
pub fn render_long(
    writer: &mut impl Write,
    branch: Option<&str>,
    files: &[GitFile],
) -> anyhow::Result<()> {
    match branch {
        Some(branch) => writeln!(writer, "On branch {branch}")?,
        None => writeln!(writer, "HEAD detached")?,
    }

    if files.is_empty() {
        writeln!(writer, "nothing to commit, working tree clean")?;
        return Ok(());
    }

    let staged = files.iter().filter(|file| file.is_staged).collect::<Vec<_>>();
    let conflicted = files
        .iter()
        .filter(|file| file.status == FileStatus::Conflict)
        .collect::<Vec<_>>();
    let unstaged = files
        .iter()
        .filter(|file| matches!(file.status, FileStatus::Modified | FileStatus::Deleted))
        .collect::<Vec<_>>();
    let untracked = files
        .iter()
        .filter(|file| file.status == FileStatus::New)
        .collect::<Vec<_>>();

    write_section(writer, "Changes to be committed:", &staged, |label| label.green())?;
    write_section(writer, "Unmerged paths:", &conflicted, |label| label.red().bold())?;
    write_section(writer, "Changes not staged for commit:", &unstaged, |label| {
        label.red()
    })?;

    if !untracked.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Untracked files:")?;
        for file in untracked {
            writeln!(writer, "\t{}", file.file_name.red())?;
        }
    }

    Ok(())
}

fn write_section(
    writer: &mut impl Write,
    title: &str,
    files: &[&GitFile],
    paint: impl Fn(String) -> colored::ColoredString,
) -> anyhow::Result<()> {
    if files.is_empty() {
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(writer, "{title}")?;
    for file in files {
        let line = format!("{:<12}{}", format!("{}:", file.status.label()), file.file_name);
        writeln!(writer, "\t{}", paint(line))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn files() -> Vec<GitFile> {
        vec![
            GitFile::new("a.txt".to_string(), FileStatus::Added),
            GitFile::new("b.txt".to_string(), FileStatus::Modified),
            GitFile::new("c.txt".to_string(), FileStatus::New),
        ]
    }

    #[test]
    fn porcelain_lines_carry_short_codes() {
        let mut output = Vec::new();
        render_porcelain(&mut output, &files()).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "A  a.txt\n M b.txt\n?? c.txt\n"
        );
    }

    #[test]
    fn long_listing_groups_files() {
        colored::control::set_override(false);
        let mut output = Vec::new();
        render_long(&mut output, Some("master"), &files()).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.starts_with("On branch master\n"));
        assert!(output.contains("Changes to be committed:\n\tadded:      a.txt\n"));
        assert!(output.contains("Changes not staged for commit:\n\tmodified:   b.txt\n"));
        assert!(output.contains("Untracked files:\n\tc.txt\n"));
    }

    #[test]
    fn clean_tree_says_so() {
        let mut output = Vec::new();
        render_long(&mut output, Some("master"), &[]).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "On branch master\nnothing to commit, working tree clean\n"
        );
    }
}
