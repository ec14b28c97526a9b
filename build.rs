fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Version, features and build time for `notecheck version`
    built::write_built_file()
        .expect("Failed to acquire build-time information");
}
