use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Piped input document, parsed as JSON and, failing that, YAML. `None`
/// when stdin is a terminal or carries nothing.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut piped = String::new();
    io::stdin().read_to_string(&mut piped)?;
    parse_piped(&piped)
}

fn parse_piped<T: DeserializeOwned>(piped: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let document = piped.trim();
    if document.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str(document) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(json_err) if document.starts_with('{') || document.starts_with('[') => {
            Err(format!("Failed to parse stdin as JSON: {json_err}").into())
        }
        Err(_) => serde_yaml::from_str(document)
            .map(Some)
            .map_err(|e| format!("Failed to parse stdin as YAML: {e}").into()),
    }
}
