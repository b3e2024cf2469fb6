use log::LevelFilter;

pub const LOG_LEVEL_ENV: &str = "LOGLEVEL";

pub fn parse_level(value: Option<&str>) -> LevelFilter {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("error") => LevelFilter::Error,
        Some("warn") | Some("warning") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Install the process logger. Level comes from `LOGLEVEL`, default info.
pub fn init() {
    let level = parse_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(buf, "[{}] {}", record.level(), record.args())
    });

    let _ = builder.try_init();
}
