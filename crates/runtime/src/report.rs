//! At-exit allocation report for compiled Mica programs
//!
//! The compiler emits a call to `mica_rt_report` at program exit. Output is
//! controlled by the `MICA_REPORT` env var:
//! - Unset or `0` → no report, zero cost
//! - `1` → human-readable to stderr
//! - `json` → JSON to stderr (requires the `report-json` feature, on by
//!   default; without it the human format is used after a warning)
//! - `json:/path` → JSON to a file

use mica_core::stats::{AllocStats, snapshot};
use std::io::Write;
use std::sync::OnceLock;

/// Output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    Stderr,
    File(String),
}

/// Parsed report configuration
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub destination: ReportDestination,
}

impl ReportConfig {
    /// Parse from the MICA_REPORT environment variable
    pub fn from_env() -> Option<Self> {
        let val = std::env::var("MICA_REPORT").ok()?;
        match val.as_str() {
            "" | "0" => None,
            "1" => Some(ReportConfig {
                format: ReportFormat::Human,
                destination: ReportDestination::Stderr,
            }),
            "json" => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::Stderr,
            }),
            s if s.starts_with("json:") => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::File(s[5..].to_string()),
            }),
            _ => {
                eprintln!("Warning: MICA_REPORT='{val}' not recognized, ignoring");
                None
            }
        }
    }
}

static REPORT_CONFIG: OnceLock<Option<ReportConfig>> = OnceLock::new();

fn get_report_config() -> &'static Option<ReportConfig> {
    REPORT_CONFIG.get_or_init(ReportConfig::from_env)
}

fn render_human(out: &mut dyn Write, stats: &AllocStats) -> std::io::Result<()> {
    writeln!(out, "=== mica runtime report ===")?;
    writeln!(out, "allocations:   {}", stats.total_allocs)?;
    writeln!(out, "frees:         {}", stats.total_frees)?;
    writeln!(out, "reallocations: {}", stats.total_reallocs)?;
    writeln!(out, "live bytes:    {}", stats.live_bytes)?;
    writeln!(out, "peak bytes:    {}", stats.peak_bytes)?;
    Ok(())
}

#[cfg(feature = "report-json")]
fn render_json(out: &mut dyn Write, stats: &AllocStats) -> std::io::Result<()> {
    let doc = serde_json::json!({
        "allocations": stats.total_allocs,
        "frees": stats.total_frees,
        "reallocations": stats.total_reallocs,
        "live_bytes": stats.live_bytes,
        "peak_bytes": stats.peak_bytes,
    });
    writeln!(out, "{doc}")
}

#[cfg(not(feature = "report-json"))]
fn render_json(out: &mut dyn Write, stats: &AllocStats) -> std::io::Result<()> {
    eprintln!("Warning: built without report-json, falling back to human format");
    render_human(out, stats)
}

fn render(config: &ReportConfig, stats: &AllocStats) {
    let result = match &config.destination {
        ReportDestination::Stderr => {
            let stderr = std::io::stderr();
            let mut lock = stderr.lock();
            match config.format {
                ReportFormat::Human => render_human(&mut lock, stats),
                ReportFormat::Json => render_json(&mut lock, stats),
            }
        }
        ReportDestination::File(path) => match std::fs::File::create(path) {
            Ok(mut file) => match config.format {
                ReportFormat::Human => render_human(&mut file, stats),
                ReportFormat::Json => render_json(&mut file, stats),
            },
            Err(e) => {
                eprintln!("Warning: cannot write MICA_REPORT file '{path}': {e}");
                Ok(())
            }
        },
    };
    if let Err(e) = result {
        eprintln!("Warning: report output failed: {e}");
    }
}

/// Emit the allocation report if MICA_REPORT asks for one. The compiler
/// calls this once at program exit; calling it again re-emits with fresh
/// counters.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_report() {
    if let Some(config) = get_report_config() {
        render(config, &snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_env(value: Option<&str>, check: impl FnOnce()) {
        let original = std::env::var("MICA_REPORT").ok();
        // Safety: serialized by #[serial]; no other thread reads the
        // environment concurrently in these tests.
        unsafe {
            match value {
                Some(v) => std::env::set_var("MICA_REPORT", v),
                None => std::env::remove_var("MICA_REPORT"),
            }
        }
        check();
        // Safety: as above.
        unsafe {
            match original {
                Some(v) => std::env::set_var("MICA_REPORT", v),
                None => std::env::remove_var("MICA_REPORT"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_unset_and_zero() {
        with_env(None, || assert!(ReportConfig::from_env().is_none()));
        with_env(Some("0"), || assert!(ReportConfig::from_env().is_none()));
    }

    #[test]
    #[serial]
    fn test_config_human() {
        with_env(Some("1"), || {
            let config = ReportConfig::from_env().unwrap();
            assert_eq!(config.format, ReportFormat::Human);
            assert_eq!(config.destination, ReportDestination::Stderr);
        });
    }

    #[test]
    #[serial]
    fn test_config_json_to_file() {
        with_env(Some("json:/tmp/mica-report.json"), || {
            let config = ReportConfig::from_env().unwrap();
            assert_eq!(config.format, ReportFormat::Json);
            assert_eq!(
                config.destination,
                ReportDestination::File("/tmp/mica-report.json".to_string())
            );
        });
    }

    #[test]
    #[serial]
    fn test_config_unrecognized_ignored() {
        with_env(Some("yes-please"), || {
            assert!(ReportConfig::from_env().is_none());
        });
    }

    #[test]
    fn test_render_human_contains_counters() {
        let stats = AllocStats {
            total_allocs: 3,
            total_frees: 2,
            total_reallocs: 1,
            live_bytes: 64,
            peak_bytes: 128,
        };
        let mut buffer = Vec::new();
        render_human(&mut buffer, &stats).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("allocations:   3"));
        assert!(text.contains("peak bytes:    128"));
    }

    #[cfg(feature = "report-json")]
    #[test]
    fn test_render_json_shape() {
        let stats = AllocStats {
            total_allocs: 5,
            total_frees: 5,
            total_reallocs: 0,
            live_bytes: 0,
            peak_bytes: 4096,
        };
        let mut buffer = Vec::new();
        render_json(&mut buffer, &stats).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(doc["allocations"], 5);
        assert_eq!(doc["peak_bytes"], 4096);
    }
}
