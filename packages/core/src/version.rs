//! Version information for hostforge

/// Get the current version string
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get the long version string with build information
///
/// Build metadata comes from `HOSTFORGE_GIT_HASH` / `HOSTFORGE_BUILD_DATE`
/// when they are set at compile time.
pub fn get_version_long() -> String {
    let git_hash = option_env!("HOSTFORGE_GIT_HASH").unwrap_or("unknown");
    let build_date = option_env!("HOSTFORGE_BUILD_DATE").unwrap_or("unknown");

    format!("{} (git: {git_hash}, built: {build_date})", get_version())
}
