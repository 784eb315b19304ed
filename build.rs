//! Embeds build provenance for `router --version`:
//! `ROUTER_BUILD_COMMIT` (short hash, `+dirty` when the tree has local edits)
//! and `ROUTER_BUILD_PROFILE` (cargo profile name).

use std::path::PathBuf;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

/// Files whose change should re-run this script: HEAD, the ref it points to, and the index.
fn watched_git_files() -> Vec<PathBuf> {
    let Some(git_dir) = git(&["rev-parse", "--git-dir"]).map(PathBuf::from) else {
        return Vec::new();
    };
    let mut files = vec![git_dir.join("HEAD"), git_dir.join("index")];
    if let Some(reference) = git(&["symbolic-ref", "-q", "HEAD"]) {
        files.push(git_dir.join(reference));
    }
    files.into_iter().filter(|f| f.exists()).collect()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for file in watched_git_files() {
        println!("cargo:rerun-if-changed={}", file.display());
    }

    let commit = match git(&["rev-parse", "--short=10", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some_and(|s| !s.is_empty());
            if dirty {
                format!("{}+dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    };
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=ROUTER_BUILD_COMMIT={}", commit);
    println!("cargo:rustc-env=ROUTER_BUILD_PROFILE={}", profile);
}
