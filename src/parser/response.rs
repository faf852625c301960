//! Generator Response Parser
//!
//! Validates raw generator output against the agreed wire format. Output is
//! accepted whole or rejected whole; there is no partial success.

use crate::models::change::FileMapResponse;
use crate::models::{ChangeFormat, ProposedChange, DIFF_MARKER};
use std::path::{Component, Path};

/// Why a response was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("diff response must begin with `diff --git`")]
    MissingDiffMarker,

    #[error("file-map response is not a JSON object with a single `files` mapping: {0}")]
    InvalidFileMap(String),

    #[error("file-map path is not a safe relative path: {0}")]
    UnsafePath(String),
}

/// Parse raw generator output for the configured format.
///
/// Whitespace-only output is the explicit "no change needed" answer in
/// both formats.
pub fn parse_response(raw: &str, format: ChangeFormat) -> Result<ProposedChange, ResponseError> {
    if raw.trim().is_empty() {
        return Ok(ProposedChange::Empty);
    }

    match format {
        ChangeFormat::Diff => parse_diff(raw),
        ChangeFormat::FileMap => parse_file_map(raw),
    }
}

fn parse_diff(raw: &str) -> Result<ProposedChange, ResponseError> {
    if !raw.starts_with(DIFF_MARKER) {
        return Err(ResponseError::MissingDiffMarker);
    }

    let mut text = raw.to_string();
    // git apply treats a missing final newline as a corrupt patch
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(ProposedChange::Diff(text))
}

fn parse_file_map(raw: &str) -> Result<ProposedChange, ResponseError> {
    let response: FileMapResponse = serde_json::from_str(raw.trim())
        .map_err(|e| ResponseError::InvalidFileMap(e.to_string()))?;

    for path in response.files.keys() {
        validate_relative_path(path)?;
    }

    if response.files.is_empty() {
        return Ok(ProposedChange::Empty);
    }
    Ok(ProposedChange::FileMap(response.files))
}

/// Reject absolute paths, parent traversal and empty names
pub fn validate_relative_path(path: &str) -> Result<(), ResponseError> {
    let unsafe_path = || ResponseError::UnsafePath(path.to_string());

    if path.trim().is_empty() || path.contains('\0') || path.starts_with('\\') {
        return Err(unsafe_path());
    }

    let mut has_normal = false;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path())
            }
        }
    }

    if has_normal {
        Ok(())
    } else {
        Err(unsafe_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = "diff --git a/src/a.rs b/src/a.rs\n--- a/src/a.rs\n+++ b/src/a.rs\n@@ -1 +1 @@\n-old\n+new\n";

    #[test]
    fn test_empty_is_noop_in_both_formats() {
        assert_eq!(parse_response("", ChangeFormat::Diff), Ok(ProposedChange::Empty));
        assert_eq!(parse_response("  \n\t", ChangeFormat::FileMap), Ok(ProposedChange::Empty));
    }

    #[test]
    fn test_valid_diff() {
        let change = parse_response(SAMPLE_DIFF, ChangeFormat::Diff).unwrap();
        assert_eq!(change, ProposedChange::Diff(SAMPLE_DIFF.to_string()));
    }

    #[test]
    fn test_diff_gets_trailing_newline() {
        let raw = SAMPLE_DIFF.trim_end();
        match parse_response(raw, ChangeFormat::Diff).unwrap() {
            ProposedChange::Diff(text) => assert!(text.ends_with("+new\n")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_diff_without_marker_rejected() {
        let fenced = format!("```diff\n{}```\n", SAMPLE_DIFF);
        assert_eq!(
            parse_response(&fenced, ChangeFormat::Diff),
            Err(ResponseError::MissingDiffMarker)
        );
        assert_eq!(
            parse_response("Here is your patch:\ndiff --git a/x b/x", ChangeFormat::Diff),
            Err(ResponseError::MissingDiffMarker)
        );
    }

    #[test]
    fn test_valid_file_map() {
        let raw = r#"{"files": {"src/bar.py": "print('bar')\n", "tests/test_bar.py": ""}}"#;
        match parse_response(raw, ChangeFormat::FileMap).unwrap() {
            ProposedChange::FileMap(files) => {
                assert_eq!(files.len(), 2);
                assert_eq!(files["src/bar.py"], "print('bar')\n");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_map_is_noop() {
        assert_eq!(
            parse_response(r#"{"files": {}}"#, ChangeFormat::FileMap),
            Ok(ProposedChange::Empty)
        );
    }

    #[test]
    fn test_file_map_extra_key_rejected() {
        let raw = r#"{"files": {"a.txt": "x"}, "notes": "hi"}"#;
        assert!(matches!(
            parse_response(raw, ChangeFormat::FileMap),
            Err(ResponseError::InvalidFileMap(_))
        ));
    }

    #[test]
    fn test_file_map_wrong_shape_rejected() {
        for raw in [
            r#"{"files": ["a.txt"]}"#,
            r#"{"files": {"a.txt": 3}}"#,
            r#"{"changes": {}}"#,
            "not json",
            SAMPLE_DIFF,
        ] {
            assert!(
                matches!(parse_response(raw, ChangeFormat::FileMap), Err(ResponseError::InvalidFileMap(_))),
                "accepted {}",
                raw
            );
        }
    }

    #[test]
    fn test_file_map_unsafe_paths_rejected() {
        for path in ["../etc/passwd", "/abs/path", "a/../../b", ".", ""] {
            let raw = serde_json::json!({ "files": { path: "x" } }).to_string();
            assert!(
                matches!(parse_response(&raw, ChangeFormat::FileMap), Err(ResponseError::UnsafePath(_))),
                "accepted {}",
                path
            );
        }
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("src/main.rs").is_ok());
        assert!(validate_relative_path("./README.md").is_ok());
        assert!(validate_relative_path("a/b/c/d.txt").is_ok());
        assert!(validate_relative_path("..").is_err());
    }
}
