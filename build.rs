fn main() {
    // cfg!(target_os) reflects the host here, the target comes from the environment
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    // Link against macOS frameworks
    if target_os == "macos" {
        println!("cargo:rustc-link-lib=framework=CoreAudio");
        println!("cargo:rustc-link-lib=framework=CoreFoundation");
    }
}
