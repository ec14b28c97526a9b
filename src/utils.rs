//! Build metadata and small helpers for the binary

#[allow(dead_code, unreachable_pub, missing_docs)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Package version.
pub fn version() -> &'static str {
    built_info::PKG_VERSION
}

/// Multi-line description of the running build.
pub fn build_summary() -> String {
    let features = if built_info::FEATURES_STR.is_empty() {
        "none"
    } else {
        built_info::FEATURES_STR
    };
    format!(
        "{} {}\nbuilt:    {}\ntarget:   {} ({})\nrustc:    {}\nfeatures: {}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::BUILT_TIME_UTC,
        built_info::TARGET,
        built_info::PROFILE,
        built_info::RUSTC_VERSION,
        features,
    )
}
