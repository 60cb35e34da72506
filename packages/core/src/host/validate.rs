//! Request validation

/// Check a proposed host name
///
/// Names start with an ASCII letter or digit, followed by letters, digits,
/// `-` or `.`.
pub fn validate_host_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Check a swarm discovery URL
///
/// An empty discovery is allowed (no swarm); anything else needs a scheme.
pub fn validate_swarm_discovery(discovery: &str) -> bool {
    discovery.is_empty() || discovery.contains("://")
}
