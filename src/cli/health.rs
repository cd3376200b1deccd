//! `samvad health` and the setup notice shown when chat starts.

use std::error::Error;

use tracing::debug;

use crate::api::{HealthReport, HealthStatus};
use crate::core::chat_stream::HttpTransport;

pub const SETUP_GUIDANCE: &str = "The backend has no Gemini API key configured, so replies will fail.
  1. Get a free API key from https://aistudio.google.com/
  2. Add GEMINI_API_KEY=your_key_here to the backend's .env.local file
  3. Restart the backend server";

fn status_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✅ healthy",
        HealthStatus::Degraded => "⚠️  degraded",
        HealthStatus::Unhealthy => "❌ unhealthy",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "available"
    } else {
        "unavailable"
    }
}

pub fn describe_health(report: &HealthReport, base_url: &str) -> Vec<String> {
    let mut lines = vec![
        format!("Backend: {base_url}"),
        format!("Status: {}", status_label(report.status)),
        format!("  gemini: {}", yes_no(report.services.gemini)),
        format!("  database: {}", yes_no(report.services.database)),
        format!("  voice: {}", yes_no(report.services.voice)),
    ];
    if let Some(version) = &report.version {
        lines.push(format!("Version: {version}"));
    }
    if let Some(environment) = &report.environment {
        lines.push(format!("Environment: {environment}"));
    }
    if let Some(error) = &report.error {
        lines.push(format!("Error: {error}"));
    }
    lines
}

pub async fn run_health(transport: &HttpTransport) -> Result<(), Box<dyn Error>> {
    let report = transport.check_health().await?;
    for line in describe_health(&report, transport.base_url()) {
        println!("{line}");
    }
    if report.needs_setup() {
        println!();
        println!("{SETUP_GUIDANCE}");
    }
    Ok(())
}

/// Print setup guidance when the backend reports a missing credential.
/// Chat goes ahead either way.
pub async fn warn_if_setup_needed(transport: &HttpTransport) {
    match transport.check_health().await {
        Ok(report) if report.needs_setup() => eprintln!("⚠️  {SETUP_GUIDANCE}\n"),
        Ok(_) => {}
        Err(err) => debug!("health check failed: {err}"),
    }
}
