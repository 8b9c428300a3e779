// Purpose: Path and shell helpers shared by the recipe modules.

/// Joins `name` onto `base` unless `name` is already absolute.
pub fn join_path(base: &str, name: &str) -> String {
    if name.starts_with('/') {
        return name.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name)
}

// True when `path` is `dir` itself or lies below it.
pub fn is_within(path: &str, dir: &str) -> bool {
    let path = path.trim_end_matches('/');
    let dir = dir.trim_end_matches('/');
    path == dir || path.starts_with(&format!("{}/", dir))
}

/// Returns the last segment of a path, URL or scp-style git address.
pub fn final_segment(locator: &str) -> &str {
    let trimmed = locator.trim_end_matches('/');
    trimmed
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed)
}

pub fn is_valid_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Quotes a value for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

/// Parses a `NAME=value` pair as given on the command line.
pub fn parse_env_pair(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((name, value)) if is_valid_var_name(name) => {
            Ok((name.to_string(), value.to_string()))
        }
        Some((name, _)) => Err(format!("invalid variable name: {}", name)),
        None => Err(format!("expected NAME=VALUE, got {}", pair)),
    }
}
