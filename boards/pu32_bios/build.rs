// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Links the BIOS with `layout.ld` when building for the bare-metal target.
//! Host builds of the board use the emulated SoC and the default linker
//! setup.

const LINKER_SCRIPT: &str = "layout.ld";

fn main() {
    println!("cargo:rerun-if-changed={}", LINKER_SCRIPT);
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }
    // Include the folder where the board's Cargo.toml is in the linker file
    // search path.
    println!("cargo:rustc-link-arg=-L{}", std::env!("CARGO_MANIFEST_DIR"));
    println!("cargo:rustc-link-arg=-T{}", LINKER_SCRIPT);
}
