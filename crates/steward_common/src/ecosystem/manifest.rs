//! Manifest editing for remediation.
//!
//! Entries are removed through real parsers, never text substitution:
//! `package.json` goes through serde_json (unknown fields survive the
//! round trip), `requirements.txt` through a line-level requirement
//! parser. Gemfiles are Ruby code and are not edited.

use crate::error::StewardError;
use std::fs;
use std::path::Path;

/// Remove `package` from the dependency sections of a package.json.
/// Returns whether an entry was actually removed.
pub fn remove_npm_dependency(path: &Path, package: &str) -> Result<bool, StewardError> {
    let raw = fs::read_to_string(path)?;
    let mut doc: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| StewardError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut removed = false;
    for section in ["dependencies", "devDependencies", "optionalDependencies"] {
        if let Some(map) = doc.get_mut(section).and_then(|v| v.as_object_mut()) {
            removed |= map.remove(package).is_some();
        }
    }

    if removed {
        let mut pretty = serde_json::to_string_pretty(&doc).map_err(|e| StewardError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        pretty.push('\n');
        fs::write(path, pretty)?;
    }
    Ok(removed)
}

/// Remove `package` from a requirements.txt. Returns whether a
/// requirement line was actually removed.
pub fn remove_requirement(path: &Path, package: &str) -> Result<bool, StewardError> {
    let raw = fs::read_to_string(path)?;
    let wanted = normalize(package);

    let mut kept = Vec::new();
    let mut removed = false;
    for line in raw.lines() {
        match requirement_name(line) {
            Some(name) if normalize(&name) == wanted => removed = true,
            _ => kept.push(line),
        }
    }

    if removed {
        let mut out = kept.join("\n");
        out.push('\n');
        fs::write(path, out)?;
    }
    Ok(removed)
}

/// Extract the distribution name from one requirements.txt line.
/// Comments, blank lines, and pip options (`-r`, `--hash`, ...) carry
/// no name.
pub fn requirement_name(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }
    let name: String = line
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// PEP 503 name normalization: compare case-insensitively with runs of
/// `-`, `_`, `.` collapsed to a single `-`.
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_remove_npm_dependency_preserves_other_fields() {
        let file = fixture(
            r#"{
  "name": "demo",
  "version": "1.0.0",
  "scripts": {"test": "jest"},
  "dependencies": {"left-padx": "^1.0.0", "express": "^4.18.0"},
  "devDependencies": {"jest": "^29.0.0"}
}"#,
        );

        let removed = remove_npm_dependency(file.path(), "left-padx").unwrap();
        assert!(removed);

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        assert!(doc["dependencies"].get("left-padx").is_none());
        assert_eq!(doc["dependencies"]["express"], "^4.18.0");
        assert_eq!(doc["scripts"]["test"], "jest");
        assert_eq!(doc["devDependencies"]["jest"], "^29.0.0");
    }

    #[test]
    fn test_remove_npm_dependency_missing_entry() {
        let file = fixture(r#"{"dependencies": {"express": "^4.18.0"}}"#);
        let removed = remove_npm_dependency(file.path(), "left-padx").unwrap();
        assert!(!removed);
    }

    #[test]
    fn test_remove_npm_dependency_rejects_broken_manifest() {
        let file = fixture("{not json");
        assert!(remove_npm_dependency(file.path(), "x").is_err());
    }

    #[test]
    fn test_remove_requirement_keeps_comments_and_options() {
        let file = fixture("# pinned deps\n-r base.txt\nrequests==2.31.0\nLeft_Pad.x==1.0\nflask>=3.0\n");

        let removed = remove_requirement(file.path(), "left-pad-x").unwrap();
        assert!(removed);

        let contents = fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("# pinned deps"));
        assert!(contents.contains("-r base.txt"));
        assert!(contents.contains("requests==2.31.0"));
        assert!(contents.contains("flask>=3.0"));
        assert!(!contents.contains("Left_Pad.x"));
    }

    #[test]
    fn test_requirement_name_parsing() {
        assert_eq!(requirement_name("requests==2.31.0").as_deref(), Some("requests"));
        assert_eq!(requirement_name("flask [async] >=3.0").as_deref(), Some("flask"));
        assert_eq!(requirement_name("  # comment"), None);
        assert_eq!(requirement_name("--hash=sha256:abc"), None);
        assert_eq!(requirement_name(""), None);
    }

    #[test]
    fn test_pep503_normalization() {
        assert_eq!(normalize("Left_Pad.x"), "left-pad-x");
        assert_eq!(normalize("requests"), "requests");
        assert_eq!(normalize("a__b"), "a-b");
    }
}
