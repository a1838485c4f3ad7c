//! Embeds build metadata logged at controller startup.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let timestamp = std::env::var("BUILD_TIMESTAMP")
        .ok()
        .and_then(|ts| ts.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs())
        });

    let datetime = std::env::var("BUILD_DATETIME")
        .unwrap_or_else(|_| chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string());

    let git_hash = std::env::var("BUILD_GIT_HASH")
        .ok()
        .or_else(git_hash)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_TIMESTAMP={timestamp}");
    println!("cargo:rustc-env=BUILD_DATETIME={datetime}");
    println!("cargo:rustc-env=BUILD_GIT_HASH={git_hash}");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_TIMESTAMP");
    println!("cargo:rerun-if-env-changed=BUILD_GIT_HASH");
}

fn git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let dirty = Command::new("git")
        .args(["diff", "--quiet"])
        .output()
        .is_ok_and(|output| !output.status.success());
    Some(format!("{}{}", hash.trim(), if dirty { "-dirty" } else { "" }))
}
