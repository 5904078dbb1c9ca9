//! Environment readiness check.

use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use std::process::Command;

use crate::cli::output;
use crate::config::HarvestConfig;
use crate::renderer::chromium::find_chromium;

/// Check Chromium availability, environment configuration and memory.
pub async fn run() -> Result<()> {
    let config = HarvestConfig::from_env("doctor");
    let chromium_path = config.chromium_path.clone().or_else(find_chromium);
    let config_check = config.validate();
    let profile_dir = config.user_data_dir.clone();
    let mem_mb = get_available_memory_mb();

    let ready = chromium_path.is_some() && config_check.is_ok();

    if output::is_json() {
        output::print_json(&json!({
            "ready": ready,
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium_path,
            "config_error": config_check.as_ref().err().map(|e| e.to_string()),
            "user_data_dir": profile_dir,
            "available_memory_mb": mem_mb,
        }));
        return Ok(());
    }

    println!("Tweetline Doctor");
    println!("================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set TWEETLINE_CHROMIUM_PATH."
        ),
    }

    match &config_check {
        Ok(()) => println!("[OK] TWEETLINE_* settings are valid"),
        Err(e) => println!("[!!] Invalid TWEETLINE_* setting: {e}"),
    }

    print_profile_dir(profile_dir.as_ref());

    match mem_mb {
        Some(mb) if mb >= 512 => println!("[OK] Available memory: {mb}MB (>= 512MB required)"),
        Some(mb) => println!("[!!] Available memory: {mb}MB (< 512MB, Chromium may crash)"),
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

fn print_profile_dir(dir: Option<&PathBuf>) {
    match dir {
        Some(dir) if dir.is_dir() => {
            println!("[OK] Browser profile: {}", dir.display())
        }
        Some(dir) => println!("[!!] Browser profile directory missing: {}", dir.display()),
        None => println!("[--] No browser profile set; pages load logged out"),
    }
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        s.lines()
            .find(|line| line.starts_with("Mem:"))
            .and_then(|line| line.split_whitespace().nth(6))
            .and_then(|v| v.parse().ok())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
