//! Parse `.env` file into a key-value map (no overwrite of existing env here; applied in lib).

use std::collections::HashMap;
use std::path::Path;

/// Path to try for `.env`: `override_dir` if given, else current directory.
fn env_file_path(override_dir: Option<&Path>) -> Option<std::path::PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Minimal .env parser: lines as KEY=VALUE, skip empty and # comments, trim key and value.
///
/// * `export KEY=VALUE` is accepted; the `export ` prefix is stripped.
/// * Empty value: `KEY=` or `KEY=""` yields key with value `""`.
/// * Comments: only lines starting with `#` (after trim) are skipped; `#` inside value is kept.
/// * Quotes: double-quoted values support `\"` escape; single-quoted values are stripped, no escape.
/// * No multiline or line continuation.
fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim().to_string();
        let value = v.trim().to_string();
        let value = if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            value[1..value.len() - 1].replace("\\\"", "\"")
        } else {
            value
        };
        let value = value
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.to_string())
            .unwrap_or(value);
        if !key.is_empty() {
            out.insert(key, value);
        }
    }
    out
}

/// Load `.env` from override_dir or current directory into a map. Missing file returns empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    let path = match env_file_path(override_dir) {
        Some(p) => p,
        None => return Ok(HashMap::new()),
    };
    let content = std::fs::read_to_string(&path)?;
    Ok(parse_env_file(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let s = "FOO=bar\nBAZ=quux\n";
        let m = parse_env_file(s);
        assert_eq!(m.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(m.get("BAZ"), Some(&"quux".to_string()));
    }

    #[test]
    fn skip_comments_and_empty() {
        let s = "\n# comment\nKEY=val\n  \n";
        let m = parse_env_file(s);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("KEY"), Some(&"val".to_string()));
    }

    #[test]
    fn export_prefix_is_stripped() {
        let m = parse_env_file("export KEY=val\n");
        assert_eq!(m.get("KEY"), Some(&"val".to_string()));
    }

    #[test]
    fn double_quotes_stripped_with_escape() {
        let m = parse_env_file(r#"KEY="a \"b\" c""#);
        assert_eq!(m.get("KEY"), Some(&r#"a "b" c"#.to_string()));
    }

    #[test]
    fn single_quotes_stripped_no_escape() {
        let m = parse_env_file("KEY='raw value'\n");
        assert_eq!(m.get("KEY"), Some(&"raw value".to_string()));
    }

    #[test]
    fn empty_value_kept() {
        let m = parse_env_file("KEY=\n");
        assert_eq!(m.get("KEY"), Some(&String::new()));
    }
}
