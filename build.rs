//! Embeds the git revision and build time for `tokenflow --version`.

use std::env;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    for key in ["TOKENFLOW_BUILD_GIT_HASH", "TOKENFLOW_BUILD_TIMESTAMP"] {
        println!("cargo:rerun-if-env-changed={key}");
    }

    let revision = env::var("TOKENFLOW_BUILD_GIT_HASH")
        .ok()
        .or_else(|| command_stdout("git", &["rev-parse", "--short=12", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    let built_at = env::var("TOKENFLOW_BUILD_TIMESTAMP")
        .ok()
        .or_else(|| command_stdout("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"]))
        .unwrap_or_else(unix_fallback_timestamp);

    println!("cargo:rustc-env=TOKENFLOW_BUILD_GIT_HASH={revision}");
    println!("cargo:rustc-env=TOKENFLOW_BUILD_TIMESTAMP={built_at}");
}

fn unix_fallback_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    format!("unix:{secs}")
}

fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
