/// Get environment variable with DOGAI_ prefix, falling back to unprefixed version
///
/// Checks `DOGAI_{key}` first, then `{key}`. Values that are empty after
/// trimming count as unset.
///
/// # Examples
///
/// ```rust
/// use dogai_billing::utils::get_env_with_prefix;
///
/// // Checks DOGAI_DATABASE_URL first, then DATABASE_URL
/// let url = get_env_with_prefix("DATABASE_URL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("DOGAI_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse a boolean flag the way the environment usually spells it.
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
