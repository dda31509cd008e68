//! Logger setup.
//!
//! Android goes to logcat under the `xrphone` tag. Everywhere else log lines are
//! written to stderr. `XRPHONE_LOG` picks the level (default `info`).

use std::sync::Once;

use log::LevelFilter;

pub const LOG_LEVEL_VAR: &str = "XRPHONE_LOG";

static INIT: Once = Once::new();

/// Installs the logger. Later calls do nothing.
pub fn init() {
    INIT.call_once(|| {
        let level = level_from(std::env::var(LOG_LEVEL_VAR).ok().as_deref());
        install(level);
    });
}

pub fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

#[cfg(target_os = "android")]
fn install(level: LevelFilter) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level)
            .with_tag("xrphone"),
    );
}

#[cfg(not(target_os = "android"))]
fn install(level: LevelFilter) {
    static LOGGER: StderrLogger = StderrLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(not(target_os = "android"))]
struct StderrLogger;

#[cfg(not(target_os = "android"))]
impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[xrphone] {:<5} {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}
