use std::process::Command;

/// Short commit hash of the checkout, if built from one.
fn git_sha() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let sha = git_sha().unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=AURA_GIT_SHA={sha}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}
