// stdout sink for the `log` facade
//
// Level comes from TASKLET_LOG (error, warn, info, debug, trace, off),
// default info. Lines look like `INFO  tasklet_kernel::scheduler: ...`.

use log::{LevelFilter, Log, Metadata, Record};

pub const ENV_VAR: &str = "TASKLET_LOG";

struct StdoutLogger;

static LOGGER: StdoutLogger = StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            println!("{:<5} {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Parse a level name, falling back to `info` on anything unknown.
pub fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the logger with the level from the environment. Later calls
/// are no-ops.
pub fn init_from_env() {
    let value = std::env::var(ENV_VAR).ok();
    let level = level_from(value.as_deref());
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
