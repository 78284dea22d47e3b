use std::io::Write;
use std::path::Path;

use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use crate::config::Config;

/// Install the process-wide logger: `<home>/logs/cx.log` at the configured
/// level, plus debug output on stderr when `verbose` is set.
///
/// Best-effort: if the log file cannot be opened only the stderr logger
/// (if any) is installed.
pub fn init(config: &Config, verbose: bool) {
    let log_config = ConfigBuilder::new()
        .add_filter_allow_str("cx_shell")
        .add_filter_allow_str("cx")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    let log_dir = config.home_dir().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    if let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("cx.log"))
    {
        loggers.push(WriteLogger::new(config.log_level(), log_config.clone(), file));
    }

    if verbose {
        loggers.push(TermLogger::new(
            log::LevelFilter::Debug,
            log_config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }
}

/// Append a pipeline record to `<home>/logs/history.log`.
/// Best-effort: failures are silently ignored (logging must never block the prompt).
pub fn log_pipeline(home: &Path, line: &str, outcome: &str, detail: &str) {
    let log_dir = home.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("history.log"))
    else {
        return;
    };

    // Tabs and newlines would break the one-record-per-line format
    let line_oneline: String = line
        .replace(['\n', '\t'], " ")
        .chars()
        .take(200)
        .collect();
    let detail_oneline = detail.replace('\n', "; ").replace('\t', " ");
    let ts = timestamp_now();

    let _ = writeln!(file, "{ts}\t{outcome}\t{line_oneline}\t{detail_oneline}");
}

/// Simple UTC timestamp without external deps.
pub fn timestamp_now() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_timestamp(dur.as_secs())
}

fn format_timestamp(secs: u64) -> String {
    let days = secs / 86400;
    let rem = secs % 86400;
    let h = rem / 3600;
    let m = (rem % 3600) / 60;
    let s = rem % 60;
    let (year, month, day) = epoch_days_to_date(days);
    format!("{year:04}-{month:02}-{day:02}T{h:02}:{m:02}:{s:02}Z")
}

/// Convert days since Unix epoch to (year, month, day).
fn epoch_days_to_date(days: u64) -> (u64, u64, u64) {
    // Civil calendar from days algorithm (Howard Hinnant)
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
