use fern::Dispatch;
use log::LevelFilter;

/// Initializes the global logger. Call once at the top of `main`.
///
/// Level comes from `RUST_LOG` (default `info`). Set `LOG_FILE` to also
/// write to a file; console output always goes to stderr.
pub fn init() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let mut dispatch = Dispatch::new()
        .level(level)
        .level_for("rocket", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    if let Ok(path) = std::env::var("LOG_FILE") {
        match fern::log_file(&path) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(e) => eprintln!("Failed to open log file '{path}': {e}"),
        }
    }

    // A second init (tests, embedded use) keeps the first logger.
    let _ = dispatch.apply();
}
