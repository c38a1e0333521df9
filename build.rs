//! Links `libespeak-ng` when phonemisation runs in-process.
//!
//! iOS cannot spawn processes and Android ships no `espeak-ng` binary, so on
//! those targets (and on desktop with the `espeak-lib` feature) the engine
//! calls the library directly and this script emits `cfg(espeak_linked)`.
//!
//! Library lookup:
//! 1. `ESPEAK_LIB_DIR`: directory holding `libespeak-ng.{a,so,dylib}`
//!    (mobile cross-compilation)
//! 2. pkg-config (desktop)
//! 3. the linker's default search paths
//!
//! iOS links the static library.

use std::env;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(espeak_linked)");
    println!("cargo:rerun-if-env-changed=ESPEAK_LIB_DIR");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let mobile = matches!(target_os.as_str(), "ios" | "android");
    let kitten = env::var_os("CARGO_FEATURE_KITTEN").is_some();
    let requested = env::var_os("CARGO_FEATURE_ESPEAK_LIB").is_some();

    if !kitten || !(mobile || requested) {
        return;
    }
    println!("cargo:rustc-cfg=espeak_linked");

    let kind = if target_os == "ios" { "static" } else { "dylib" };

    if let Ok(dir) = env::var("ESPEAK_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
        println!("cargo:rustc-link-lib={kind}=espeak-ng");
        return;
    }

    // pkg-config prints its own link lines
    if !mobile
        && pkg_config::Config::new()
            .atleast_version("1.49")
            .probe("espeak-ng")
            .is_ok()
    {
        return;
    }

    println!("cargo:rustc-link-lib={kind}=espeak-ng");
}
