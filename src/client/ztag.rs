//! Parsing of `p4 -ztag` tagged output.
//!
//! Tagged output is a sequence of records separated by blank lines. Each
//! field is a line of the form `... key value`; a line without the `... `
//! prefix continues the previous field's value. Records are returned as
//! ordered key/value maps so callers can look fields up by tag name.

use std::collections::BTreeMap;

/// One tagged record: field name to field value.
pub type TagGroup = BTreeMap<String, String>;

const FIELD_PREFIX: &str = "... ";

/// Parses the stdout of a `p4 -ztag` invocation into records.
///
/// Tolerant by construction: unknown tags are kept as-is, values may be
/// empty, and trailing whitespace is ignored. Output that contains no
/// tagged lines parses to an empty list.
pub fn parse_ztag(output: &str) -> Vec<TagGroup> {
    let mut groups = Vec::new();
    let mut current = TagGroup::new();
    let mut last_key: Option<String> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }

        if let Some(field) = line.strip_prefix(FIELD_PREFIX) {
            let (key, value) = match field.split_once(' ') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (field.to_string(), String::new()),
            };
            current.insert(key.clone(), value);
            last_key = Some(key);
        } else if let Some(key) = &last_key {
            // Continuation of a multi-line value (e.g. changelist
            // descriptions from `changes -l`).
            let entry = current.entry(key.clone()).or_default();
            entry.push('\n');
            entry.push_str(line);
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Builds the synthetic record used when `p4` writes a diagnostic instead
/// of tagged output, mirroring the error dictionaries of the tagged
/// protocol itself.
pub fn error_group(command: &str, message: &str) -> TagGroup {
    let mut group = TagGroup::new();
    group.insert("code".to_string(), "error".to_string());
    group.insert("command".to_string(), command.to_string());
    group.insert("data".to_string(), message.to_string());
    group
}

/// True for records whose `code` field marks a failure.
pub fn is_error(group: &TagGroup) -> bool {
    group.get("code").map(String::as_str) == Some("error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_record() {
        let output = "... depotFile //depot/a.txt\n... headRev 3\n... haveRev 2\n";
        let groups = parse_ztag(output);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["depotFile"], "//depot/a.txt");
        assert_eq!(groups[0]["headRev"], "3");
        assert_eq!(groups[0]["haveRev"], "2");
    }

    #[test]
    fn blank_lines_separate_records() {
        let output = "\
... depotFile //depot/a.txt
... headRev 3

... depotFile //depot/b.txt
... headRev 1
";
        let groups = parse_ztag(output);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["depotFile"], "//depot/a.txt");
        assert_eq!(groups[1]["depotFile"], "//depot/b.txt");
    }

    #[test]
    fn continuation_lines_extend_the_previous_value() {
        let output = "\
... change 1234
... desc first line
second line

... change 1235
... desc short
";
        let groups = parse_ztag(output);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["desc"], "first line\nsecond line");
        assert_eq!(groups[1]["desc"], "short");
    }

    #[test]
    fn tag_without_value_parses_to_empty_string() {
        let groups = parse_ztag("... isMapped\n... depotFile //depot/a\n");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["isMapped"], "");
    }

    #[test]
    fn untagged_output_parses_to_nothing() {
        assert!(parse_ztag("").is_empty());
        assert!(parse_ztag("Change 1234 created.\n").is_empty());
    }

    #[test]
    fn error_groups_are_recognizable() {
        let group = error_group("fstat", "foo.txt - no such file(s).");
        assert!(is_error(&group));
        assert_eq!(group["data"], "foo.txt - no such file(s).");

        let mut ok = TagGroup::new();
        ok.insert("code".to_string(), "stat".to_string());
        assert!(!is_error(&ok));
    }
}
