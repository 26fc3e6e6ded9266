//! Build script for shielded-params
//!
//! When the `ffi` feature is enabled this uses cxx-build to generate the
//! C++ bindings from the Rust cxx bridge definitions.

fn main() {
    println!("cargo:rerun-if-changed=src/ffi/bridge.rs");
    println!("cargo:rerun-if-changed=src/lib.rs");

    if std::env::var_os("CARGO_FEATURE_FFI").is_none() {
        return;
    }

    // Build the cxx bridge
    cxx_build::bridge("src/ffi/bridge.rs")
        .flag_if_supported("-std=c++17")
        .flag_if_supported("-Wall")
        .flag_if_supported("-Wextra")
        .compile("shielded-params");
}
