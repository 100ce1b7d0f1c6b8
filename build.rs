//! Build script that stamps version metadata into the binary.
//!
//! Sets `PREFS_BUILD_TIMESTAMP` (UTC, RFC 3339) and `PREFS_GIT_COMMIT` (short
//! hash, or "unknown" outside a git checkout) for `prefs --version`.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");

    let built = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    println!("cargo:rustc-env=PREFS_BUILD_TIMESTAMP={built}");

    let commit = short_commit().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=PREFS_GIT_COMMIT={commit}");
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|h| !h.is_empty())
}
