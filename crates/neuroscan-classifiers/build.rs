//! Records the resolved candle-core version for the runtime compatibility gate.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const RUNTIME_CRATE: &str = "candle-core";

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());

    let lockfile = manifest_dir
        .ancestors()
        .map(|dir| dir.join("Cargo.lock"))
        .find(|path| path.exists());

    let version = lockfile
        .as_deref()
        .and_then(locked_version)
        .unwrap_or_else(|| "unknown".to_string());

    if let Some(lockfile) = &lockfile {
        println!("cargo:rerun-if-changed={}", lockfile.display());
    }
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-env=NEUROSCAN_RUNTIME_VERSION={}", version);
}

/// Find the `version` entry of the runtime package in a Cargo.lock
fn locked_version(lockfile: &Path) -> Option<String> {
    let content = fs::read_to_string(lockfile).ok()?;
    let name_line = format!("name = \"{}\"", RUNTIME_CRATE);

    let mut lines = content.lines();
    while let Some(line) = lines.next() {
        if line.trim() != name_line {
            continue;
        }
        let version = lines.next()?.trim();
        return version
            .strip_prefix("version = \"")
            .and_then(|v| v.strip_suffix('"'))
            .map(str::to_string);
    }
    None
}
