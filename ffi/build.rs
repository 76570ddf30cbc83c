//! Generate `include/kvproxy.h` from the `extern "C"` surface.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let crate_dir =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let header = crate_dir.join("include").join("kvproxy.h");

    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("KVPROXY_H")
        .with_pragma_once(false)
        .generate();

    // A header failure must not break the library build.
    match generated {
        Ok(bindings) => {
            if let Some(dir) = header.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            bindings.write_to_file(&header);
        }
        Err(e) => println!("cargo:warning=cbindgen failed: {e}"),
    }
}
