/// Reads an optional environment variable. Unset, blank and non-unicode
/// values all yield `None`; surrounding whitespace is trimmed.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Maps an environment variable name onto a lowercase setting key when it
/// carries `prefix`, e.g. `KUNSKAP_OUTPUT_TABLE_NAME` -> `output_table_name`.
pub fn strip_prefixed_key(prefix: &str, name: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}
