//! `extdata jsonpath`: evaluate an expression against a local document.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{ExtDataError, Result};
use crate::jsonpath::JsonPath;

pub fn run(file: &Path, expression: &str) -> Result<()> {
    let content = read_input(file)?;
    for value in evaluate(&content, expression)? {
        println!("{}", serde_json::to_string(&value)?);
    }
    Ok(())
}

/// JSON is tried first, then YAML.
pub fn evaluate(content: &str, expression: &str) -> Result<Vec<serde_json::Value>> {
    let path = JsonPath::parse(expression).map_err(|e| ExtDataError::Other(e.to_string()))?;
    let root: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(json_err) => serde_yml::from_str(content).map_err(|_| json_err)?,
    };
    Ok(path.evaluate(&root))
}

fn read_input(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        return Ok(content);
    }
    fs::read_to_string(file).map_err(|e| ExtDataError::IoError {
        path: file.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_against_json_and_yaml() {
        let json_doc = r#"{"items": [{"name": "a", "price": 3}, {"name": "b", "price": 12}]}"#;
        assert_eq!(
            evaluate(json_doc, "$.items[?(@.price < 10)].name").unwrap(),
            vec![json!("a")]
        );

        let yaml_doc = "items:\n  - name: a\n  - name: b\n";
        assert_eq!(
            evaluate(yaml_doc, "$.items[*].name").unwrap(),
            vec![json!("a"), json!("b")]
        );
    }

    #[test]
    fn bad_expression_is_an_error() {
        assert!(evaluate("{}", "$.items[").is_err());
    }
}
