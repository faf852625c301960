//! Feature Descriptor Parser
//!
//! Extracts the identifier, title and verify command from backlog files:
//! - Identifier: leading decimal segment of the file name (`001-foo.md` -> `001`)
//! - `verify_command: <cmd>` directive on its own line
//! - Optional YAML body or YAML frontmatter with `title` / `verify_command`

use crate::models::FeatureDescriptor;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(?:[-_.]|$)").expect("valid id regex"))
}

fn verify_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*verify_command[ \t]*:[ \t]*(.*?)[ \t]*$").expect("valid verify regex")
    })
}

/// Parse the identifier encoded in a descriptor file name.
///
/// Returns the id as written and its numeric ordinal, or `None` when the
/// name has no leading ordinal segment.
pub fn parse_feature_id(file_name: &str) -> Option<(String, u64)> {
    let caps = id_regex().captures(file_name)?;
    let raw = caps.get(1)?.as_str();
    let ordinal = raw.parse::<u64>().ok()?;
    Some((raw.to_string(), ordinal))
}

/// Strip BOM and normalize line endings
pub fn normalize_content(content: &str) -> String {
    let s = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Build a descriptor from a backlog file's name and content
pub fn parse_descriptor(path: &Path, id: String, ordinal: u64, content: &str) -> FeatureDescriptor {
    let spec = normalize_content(content);

    let yaml = yaml_fields(path, &spec);
    let title = yaml
        .as_ref()
        .and_then(|f| f.title.clone())
        .or_else(|| markdown_title(&spec));
    let verify_command = yaml
        .as_ref()
        .and_then(|f| f.verify_command.clone())
        .or_else(|| extract_verify_command(&spec));

    FeatureDescriptor {
        id,
        ordinal,
        path: path.to_path_buf(),
        title,
        spec,
        verify_command,
    }
}

/// Find the first `verify_command:` directive in free-form text
pub fn extract_verify_command(text: &str) -> Option<String> {
    verify_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| clean_command(m.as_str())))
        .next()
        .flatten()
}

fn clean_command(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

/// First level-one markdown heading
fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Default)]
struct YamlFields {
    title: Option<String>,
    verify_command: Option<String>,
}

/// Structured fields from a YAML descriptor or YAML frontmatter.
///
/// Descriptor text stays opaque: any parse failure just means no fields.
fn yaml_fields(path: &Path, text: &str) -> Option<YamlFields> {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let source = if is_yaml {
        text.to_string()
    } else {
        frontmatter(text)?
    };

    let value: serde_yaml::Value = serde_yaml::from_str(&source).ok()?;
    let mapping = value.as_mapping()?;

    let get = |key: &str| {
        mapping
            .get(serde_yaml::Value::String(key.to_string()))
            .and_then(|v| match v {
                serde_yaml::Value::String(s) => Some(s.clone()),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    };

    Some(YamlFields {
        title: get("title").map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        verify_command: get("verify_command").and_then(|c| clean_command(&c)),
    })
}

fn frontmatter(text: &str) -> Option<String> {
    let rest = text.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_feature_id() {
        assert_eq!(parse_feature_id("001-foo.md"), Some(("001".to_string(), 1)));
        assert_eq!(parse_feature_id("42_bar.yaml"), Some(("42".to_string(), 42)));
        assert_eq!(parse_feature_id("7.yaml"), Some(("7".to_string(), 7)));
        assert_eq!(parse_feature_id("0003"), Some(("0003".to_string(), 3)));
        assert_eq!(parse_feature_id("foo.md"), None);
        assert_eq!(parse_feature_id("12abc.md"), None);
        assert_eq!(parse_feature_id("-001.md"), None);
    }

    #[test]
    fn test_parse_feature_id_overflow() {
        assert_eq!(parse_feature_id("99999999999999999999999-x.md"), None);
    }

    #[test]
    fn test_extract_verify_command() {
        let text = "# Feature\n\nDo things.\n\nverify_command: cargo test --lib\n";
        assert_eq!(extract_verify_command(text).as_deref(), Some("cargo test --lib"));

        let quoted = "verify_command: \"pytest -q tests/\"\n";
        assert_eq!(extract_verify_command(quoted).as_deref(), Some("pytest -q tests/"));

        assert_eq!(extract_verify_command("no directive here"), None);
        assert_eq!(extract_verify_command("verify_command:   \n"), None);
    }

    #[test]
    fn test_first_verify_command_wins() {
        let text = "verify_command: make a\nverify_command: make b\n";
        assert_eq!(extract_verify_command(text).as_deref(), Some("make a"));
    }

    #[test]
    fn test_markdown_descriptor() {
        let path = PathBuf::from("features/002-bar.md");
        let content = "\u{FEFF}# Add bar\r\n\r\nBar must exist.\r\nverify_command: test -f src/bar.py\r\n";
        let desc = parse_descriptor(&path, "002".to_string(), 2, content);

        assert_eq!(desc.id, "002");
        assert_eq!(desc.title.as_deref(), Some("Add bar"));
        assert_eq!(desc.verify_command.as_deref(), Some("test -f src/bar.py"));
        assert!(!desc.spec.contains('\r'));
        assert!(desc.spec.starts_with("# Add bar"));
    }

    #[test]
    fn test_yaml_descriptor() {
        let path = PathBuf::from("features/003-persist.yaml");
        let content = r#"id: "003"
title: Persist knowledge pack
description: |
  Write the pack to disk.
acceptance_criteria:
  - round trip works
verify_command: pytest tests/test_pack.py
"#;
        let desc = parse_descriptor(&path, "003".to_string(), 3, content);
        assert_eq!(desc.title.as_deref(), Some("Persist knowledge pack"));
        assert_eq!(desc.verify_command.as_deref(), Some("pytest tests/test_pack.py"));
        assert_eq!(desc.spec, content);
    }

    #[test]
    fn test_markdown_frontmatter() {
        let path = PathBuf::from("features/004-x.md");
        let content = "---\ntitle: Frontmatter title\nverify_command: make check\n---\n# Heading\n";
        let desc = parse_descriptor(&path, "004".to_string(), 4, content);
        assert_eq!(desc.title.as_deref(), Some("Frontmatter title"));
        assert_eq!(desc.verify_command.as_deref(), Some("make check"));
    }

    #[test]
    fn test_broken_yaml_falls_back_to_text() {
        let path = PathBuf::from("features/005-x.yaml");
        let content = "title: [unclosed\nverify_command: echo ok\n";
        let desc = parse_descriptor(&path, "005".to_string(), 5, content);
        assert_eq!(desc.verify_command.as_deref(), Some("echo ok"));
        assert_eq!(desc.title, None);
    }
}
