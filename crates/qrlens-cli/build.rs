//! Build script to embed Info.plist into the macOS binary.
//!
//! macOS only grants camera access to binaries that carry a usage
//! description.

fn main() {
    #[cfg(target_os = "macos")]
    {
        let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set, skipping Info.plist");
            return;
        };
        let info_plist_path = format!("{}/../../scripts/Info.plist", manifest_dir);

        if std::path::Path::new(&info_plist_path).exists() {
            // Embed Info.plist into the binary's __TEXT,__info_plist section
            println!(
                "cargo:rustc-link-arg-bins=-Wl,-sectcreate,__TEXT,__info_plist,{}",
                info_plist_path
            );
            println!("cargo:rerun-if-changed={}", info_plist_path);
        } else {
            println!(
                "cargo:warning=Info.plist not found at {}, camera access may not work",
                info_plist_path
            );
        }
    }
}
