use colored::Colorize;
use middleware::logger::LoggerMiddleware;

pub mod middleware {
    pub mod logger;
}

/// Targets that flood the output at debug level.
const NOISY_TARGETS: [&str; 6] = ["hyper", "hyper_util", "h2", "rustls", "sqlx", "tokio_util"];

/// Installs the global logger. Records always go to `log_file`; stdout is
/// added when `console` is set.
pub fn setup(log_file: &str, console: bool) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let color = match record.level() {
                log::Level::Info => "green",
                log::Level::Warn => "yellow",
                log::Level::Error => "red",
                log::Level::Debug => "magenta",
                log::Level::Trace => "bright black",
            };
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.target(),
                record.level().to_string().color(color),
                message
            ))
        })
        .level(log::LevelFilter::Debug);
    for target in NOISY_TARGETS {
        dispatch = dispatch.level_for(target, log::LevelFilter::Warn);
    }
    if console {
        dispatch = dispatch.chain(std::io::stdout());
    }
    dispatch.chain(fern::log_file(log_file)?).apply()?;
    Ok(())
}

/// Per-request console line: status, method, path, duration and principal.
pub fn middleware() -> LoggerMiddleware {
    LoggerMiddleware::new()
}
