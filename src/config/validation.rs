use regex::Regex;
use std::sync::OnceLock;

fn env_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// Expand `${VAR_NAME}` placeholders using `lookup`. Unknown variables are
/// left in place so the misconfiguration stays visible.
pub fn expand_env_var_in_string<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = value.to_string();

    for cap in env_placeholder().captures_iter(value) {
        let var_name = &cap[1];
        let replacement = lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name));
        result = result.replace(&cap[0], &replacement);
    }

    result
}

/// Expand an optional config string, treating an empty result as unset.
pub fn expand_optional<F>(value: Option<&String>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    value
        .map(|v| expand_env_var_in_string(v, lookup))
        .filter(|v| !v.trim().is_empty())
}
