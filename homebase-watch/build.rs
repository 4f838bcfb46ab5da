//! Stamps homebase-watch with a one-line build description
//!
//! `HOMEBASE_BUILD_INFO` reads like `3f2c9e1a-dirty release 2026-01-05T09:12:00Z`
//! and is printed in the startup banner.

use std::process::Command;

/// `git describe` of the working tree, `unknown` outside a checkout
fn git_revision() -> String {
    Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_string())
        .filter(|rev| !rev.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    println!(
        "cargo:rustc-env=HOMEBASE_BUILD_INFO={} {} {}",
        git_revision(),
        profile,
        built_at
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
