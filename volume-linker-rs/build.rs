//! Build script for Volume Linker
//!
//! Links the Windows libraries used by the Core Audio and registry code.

fn main() {
    // Only run on Windows
    if std::env::var("CARGO_CFG_TARGET_OS").map_or(true, |os| os != "windows") {
        return;
    }

    println!("cargo:rustc-link-lib=ole32");
    println!("cargo:rustc-link-lib=user32");
    println!("cargo:rustc-link-lib=advapi32");
    println!("cargo:rerun-if-changed=build.rs");
}
