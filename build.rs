fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Package name and version for the health endpoint and startup log
    built::write_built_file().expect("Failed to write built.rs");
}
