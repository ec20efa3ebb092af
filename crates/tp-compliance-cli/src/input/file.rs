use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use tp_compliance_core::interest_limitation::RuleTables;

/// Read a JSON or YAML document (by extension) into a typed struct.
pub fn read_document<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let value: T = if is_yaml(&canonical) {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    Ok(value)
}

/// Statutory rule tables, or the override document at `path`. Overrides are
/// checked before any computation runs.
pub fn load_rules(path: Option<&str>) -> Result<RuleTables, Box<dyn std::error::Error>> {
    let rules = match path {
        Some(path) => read_document::<RuleTables>(path)?,
        None => RuleTables::default(),
    };
    rules.validate()?;
    Ok(rules)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Resolve and validate the path, preventing directory traversal.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_detected_by_extension() {
        assert!(is_yaml(Path::new("rules.yaml")));
        assert!(is_yaml(Path::new("/tmp/rules.yml")));
        assert!(!is_yaml(Path::new("rules.json")));
        assert!(!is_yaml(Path::new("rules")));
    }

    #[test]
    fn test_statutory_rules_without_override() {
        let rules = load_rules(None).unwrap();
        assert_eq!(rules, RuleTables::default());
    }

    #[test]
    fn test_missing_file_reported() {
        let err = load_rules(Some("does-not-exist.yaml")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
