//! Decoding of `git status --porcelain -z` output
//!
//! Each record is `XY <path>\0`, where `X` describes the index and `Y` the
//! working tree. Rename and copy records carry the original path as a second
//! NUL-terminated field. Anything printed before the first record (warnings
//! from hooks or configuration) is discarded.

use crate::artifacts::status::file_status::FileStatus;
use std::collections::BTreeMap;

/// Characters that may appear in either status column
const STATUS_CHARS: &[u8] = b" MADRCU?!T";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PorcelainRecord {
    pub index: u8,
    pub worktree: u8,
    pub path: String,
    /// Source path of a rename or copy
    pub original_path: Option<String>,
}

impl PorcelainRecord {
    pub fn status(&self) -> Option<FileStatus> {
        decode_status(self.index, self.worktree)
    }
}

/// Map a two-letter status code onto a [`FileStatus`], following the same
/// precedence as the in-process decision table.
pub fn decode_status(index: u8, worktree: u8) -> Option<FileStatus> {
    let status = match (index, worktree) {
        (b'?', b'?') => FileStatus::New,
        (b'!', b'!') => FileStatus::Ignored,
        (b'U', _) | (_, b'U') | (b'A', b'A') | (b'D', b'D') => FileStatus::Conflict,
        (b'A', _) => FileStatus::Added,
        (b'R', _) => FileStatus::Renamed,
        (b'C', _) => FileStatus::Copied,
        (_, b'D') => FileStatus::Deleted,
        (_, b'M' | b'T') => FileStatus::Modified,
        (b'M' | b'T', _) => FileStatus::Staged,
        (b'D', _) => FileStatus::Removed,
        _ => return None,
    };

    Some(status)
}

/// Parse NUL-separated porcelain records. File names are decoded as UTF-8
/// (lossily) or as Latin-1.
pub fn parse_records(output: &[u8], utf8_file_names: bool) -> Vec<PorcelainRecord> {
    let mut records = Vec::new();
    let mut fields = strip_banner(output).split(|&byte| byte == 0);

    while let Some(field) = fields.next() {
        if field.len() < 4 || field[2] != b' ' {
            continue;
        }

        let (index, worktree) = (field[0], field[1]);
        let path = decode_file_name(&field[3..], utf8_file_names);

        let original_path = if matches!(index, b'R' | b'C') || matches!(worktree, b'R' | b'C') {
            fields
                .next()
                .filter(|original| !original.is_empty())
                .map(|original| decode_file_name(original, utf8_file_names))
        } else {
            None
        };

        records.push(PorcelainRecord {
            index,
            worktree,
            path,
            original_path,
        });
    }

    records
}

/// Collapse records into one status per path; when a path is reported twice
/// the status earlier in the decision table wins. The source of a staged
/// rename is reported as removed.
pub fn collapse(records: &[PorcelainRecord]) -> BTreeMap<String, FileStatus> {
    let mut statuses = BTreeMap::<String, FileStatus>::new();
    let mut record_status = |path: &str, status: FileStatus| {
        statuses
            .entry(path.to_string())
            .and_modify(|current| {
                if status.precedence() < current.precedence() {
                    *current = status;
                }
            })
            .or_insert(status);
    };

    for record in records {
        let Some(status) = record.status() else {
            continue;
        };

        record_status(record.path.as_str(), status);
        if let (b'R', Some(original)) = (record.index, &record.original_path) {
            record_status(original.as_str(), FileStatus::Removed);
        }
    }

    statuses
}

/// Status of `path` among `records`. A directory record (`dir/`) covers
/// every path beneath it.
pub fn status_of(records: &[PorcelainRecord], path: &str) -> Option<FileStatus> {
    records
        .iter()
        .filter(|record| {
            record.path == path
                || (record.path.ends_with('/') && path.starts_with(record.path.as_str()))
        })
        .filter_map(PorcelainRecord::status)
        .min_by_key(FileStatus::precedence)
}

pub fn decode_file_name(raw: &[u8], utf8_file_names: bool) -> String {
    if utf8_file_names {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        raw.iter().map(|&byte| byte as char).collect()
    }
}

/// Skip to the first offset that starts a record: the beginning of the
/// output, or right after a newline or NUL.
fn strip_banner(output: &[u8]) -> &[u8] {
    let is_record_start = |offset: usize| {
        let rest = &output[offset..];
        rest.len() >= 4
            && STATUS_CHARS.contains(&rest[0])
            && STATUS_CHARS.contains(&rest[1])
            && rest[2] == b' '
            && rest[3] != 0
    };

    if is_record_start(0) {
        return output;
    }

    output
        .iter()
        .enumerate()
        .filter(|(_, byte)| matches!(byte, b'\n' | 0))
        .map(|(offset, _)| offset + 1)
        .find(|&offset| offset < output.len() && is_record_start(offset))
        .map_or(&output[output.len()..], |offset| &output[offset..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;
    use rstest::rstest;

    #[rstest]
    #[case(b"??", FileStatus::New)]
    #[case(b"!!", FileStatus::Ignored)]
    #[case(b" M", FileStatus::Modified)]
    #[case(b"MM", FileStatus::Modified)]
    #[case(b"M ", FileStatus::Staged)]
    #[case(b"A ", FileStatus::Added)]
    #[case(b"AM", FileStatus::Added)]
    #[case(b"D ", FileStatus::Removed)]
    #[case(b" D", FileStatus::Deleted)]
    #[case(b"MD", FileStatus::Deleted)]
    #[case(b"R ", FileStatus::Renamed)]
    #[case(b"C ", FileStatus::Copied)]
    #[case(b"UU", FileStatus::Conflict)]
    #[case(b"AU", FileStatus::Conflict)]
    #[case(b"AA", FileStatus::Conflict)]
    #[case(b"DD", FileStatus::Conflict)]
    #[case(b" T", FileStatus::Modified)]
    fn decodes_status_codes(#[case] code: &[u8; 2], #[case] expected: FileStatus) {
        assert_eq!(decode_status(code[0], code[1]), Some(expected));
    }

    #[test]
    fn rename_records_consume_the_original_path() {
        let output = b"R  new.txt\0old.txt\0?? other.txt\0";
        let records = parse_records(output, true);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "new.txt");
        assert_eq!(records[0].original_path.as_deref(), Some("old.txt"));
        assert_eq!(records[1].status(), Some(FileStatus::New));
    }

    #[test]
    fn leading_banner_is_stripped() {
        let output = b"warning: could not open directory 'x/'\n M a.txt\0?? b.txt\0";
        let records = parse_records(output, true);

        let paths = records.iter().map(|r| r.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn output_without_records_is_empty() {
        assert!(parse_records(b"fatal: something odd\n", true).is_empty());
        assert!(parse_records(b"", true).is_empty());
    }

    #[test]
    fn latin1_file_names_decode_byte_per_char() {
        let output = b"?? caf\xe9.txt\0";

        assert_eq!(parse_records(output, false)[0].path, "caf\u{e9}.txt");
        assert_eq!(parse_records(output, true)[0].path, "caf\u{fffd}.txt");
    }

    #[test]
    fn duplicate_records_keep_the_stronger_status() {
        let records = parse_records(b"D  a.txt\0?? a.txt\0", true);

        assert_eq!(collapse(&records).get("a.txt"), Some(&FileStatus::Removed));
        assert_eq!(status_of(&records, "a.txt"), Some(FileStatus::Removed));
    }

    #[test]
    fn rename_sources_are_reported_as_removed() {
        let records = parse_records(b"R  b.txt\0a.txt\0C  c.txt\0b.txt\0", true);
        let statuses = collapse(&records);

        assert_eq!(statuses.get("a.txt"), Some(&FileStatus::Removed));
        assert_eq!(statuses.get("b.txt"), Some(&FileStatus::Renamed));
        assert_eq!(statuses.get("c.txt"), Some(&FileStatus::Copied));
        assert_eq!(statuses.len(), 3);
    }

    #[test]
    fn directory_records_cover_their_contents() {
        let records = parse_records(b"!! build/\0", true);

        assert_eq!(status_of(&records, "build/out.o"), Some(FileStatus::Ignored));
        assert_eq!(status_of(&records, "builder.rs"), None);
    }

    proptest! {
        #[test]
        fn every_valid_code_pair_parses_as_a_record(
            index in proptest::sample::select(STATUS_CHARS.to_vec()),
            worktree in proptest::sample::select(STATUS_CHARS.to_vec()),
            name in "[a-z]{1,10}\\.txt"
        ) {
            let mut output = vec![index, worktree, b' '];
            output.extend_from_slice(name.as_bytes());
            output.push(0);
            if matches!(index, b'R' | b'C') || matches!(worktree, b'R' | b'C') {
                output.extend_from_slice(b"source.txt\0");
            }

            let records = parse_records(&output, true);
            proptest::prop_assert_eq!(records.len(), 1);
            proptest::prop_assert_eq!(&records[0].path, &name);
        }
    }
}
