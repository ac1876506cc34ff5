use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Host builds only run the library tests against the simulators
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if arch != "avr" {
        return;
    }

    // Configure for ATmega32
    println!("cargo:rustc-link-arg=-mmcu=atmega32");

    // Pass CPU frequency for timing calculations
    println!("cargo:rustc-env=MCU_FREQ_HZ=8000000");

    if env::var("CARGO_FEATURE_STD").is_ok() {
        println!("cargo:warning=the std feature is for host tests, build firmware with --no-default-features --features firmware");
    }
}
