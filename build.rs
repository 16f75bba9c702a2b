use std::process::Command;

const VERSION_ENV: &str = "TASKBOARD_VERSION";

/// Strips a leading `v` from tags such as `v1.2.0`, leaving other values untouched.
fn strip_tag_prefix(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.strip_prefix('v') {
        Some(rest) if rest.starts_with(|ch: char| ch.is_ascii_digit()) => Some(rest.to_string()),
        _ => Some(trimmed.to_string()),
    }
}

fn describe_head() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .and_then(|value| strip_tag_prefix(&value))
}

fn main() {
    println!("cargo:rerun-if-env-changed={VERSION_ENV}");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = std::env::var(VERSION_ENV)
        .ok()
        .and_then(|value| strip_tag_prefix(&value))
        .or_else(describe_head)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=TASKBOARD_BUILD_VERSION={version}");
}
