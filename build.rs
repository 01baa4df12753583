use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());

    let memory: &[u8] = if env::var_os("CARGO_FEATURE_STM32F7X2").is_some() {
        include_bytes!("memory/stm32f722.x")
    } else {
        include_bytes!("memory/stm32l552.x")
    };
    fs::write(out.join("memory.x"), memory).unwrap();

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=memory");
}
