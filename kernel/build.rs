use std::env;

fn main() {
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_default();

    println!("cargo:rerun-if-changed=linker.ld");
    if target_arch == "x86" {
        println!("cargo:rustc-link-arg-bins=-T{}/linker.ld", manifest_dir);
        println!("cargo:rustc-link-arg-bins=-zmax-page-size=0x1000");
    }
}
