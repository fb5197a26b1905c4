use std::{any::Any, env, panic::Location};

use colored::{Color, ColoredString, Colorize};
use log::{error, Level, SetLoggerError};

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

/// Set to `1` to also see debug records from tandem itself
const DEBUG_VAR: &str = "TANDEM_LOG_DEBUG";

/// Crates whose records are tagged and allowed below warn.
const LOCAL_CRATES: [(&str, &str, Color); 3] = [
    ("tandem_relay", "RELAY", Color::Magenta),
    ("tandem_server", "SERVER", Color::Green),
    ("tandem", "TANDEM", Color::Cyan),
];

pub fn init_logger() -> Result<(), SetLoggerError> {
    let debug = env::var(DEBUG_VAR).is_ok_and(|v| v == "1");

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{} {} {:<8} {}",
                badge(record.level()),
                now.format("%H:%M:%S%.3f").to_string().dimmed(),
                tag(record.target()),
                message
            ))
        })
        .filter(move |meta| is_allowed(meta.target(), meta.level(), debug))
        .chain(std::io::stdout())
        .apply()?;

    // Panics caught while handling a message would otherwise only reach stderr
    std::panic::set_hook(Box::new(|info| {
        error!("{}", describe_panic(info.payload(), info.location()))
    }));

    Ok(())
}

fn is_allowed(target: &str, level: Level, debug: bool) -> bool {
    let is_local = local_crate(target).is_some();

    let is_allowed = ALLOWED_LEVELS.contains(&level) || debug && level == Level::Debug;
    let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&level);

    is_local && is_allowed || is_severe
}

fn local_crate(target: &str) -> Option<(&'static str, Color)> {
    let module = target.split("::").next().unwrap_or_default();

    LOCAL_CRATES
        .iter()
        .find(|(name, _, _)| *name == module)
        .map(|(_, tag, color)| (*tag, *color))
}

fn tag(target: &str) -> ColoredString {
    match local_crate(target) {
        Some((tag, color)) => tag.color(color).bold(),
        None => target.split("::").next().unwrap_or(target).italic(),
    }
}

fn badge(level: Level) -> ColoredString {
    let label = format!(" {:<5} ", level);

    match level {
        Level::Error => label.white().on_red().bold(),
        Level::Warn => label.black().on_yellow(),
        Level::Info => label.black().on_bright_blue(),
        Level::Debug => label.bright_black().on_black(),
        Level::Trace => label.normal(),
    }
}

fn describe_panic(payload: &(dyn Any + Send), location: Option<&Location>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");

    match location {
        Some(location) => format!(
            "Panicked at {}:{}: {}",
            location.file(),
            location.line(),
            message
        ),
        None => format!("Panicked: {}", message),
    }
}
