//! Default logging setup for the SERIF maximum entropy tools
//!
//! Log records are prefixed with the time since [`setup`] was called and the time since the
//! previous record, which makes it easy to see where training spends its time. Whenever the
//! record target changes, a header line naming the new target is printed.
#![warn(missing_docs)]

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

/// Environment variable holding the `env_logger` filter, defaulting to `info`.
pub const LOG_ENV: &str = "SERIF_LOG";

/// Environment variable controlling colored output (`auto`, `always` or `never`).
pub const LOG_STYLE_ENV: &str = "SERIF_LOG_STYLE";

const TIMESTAMP_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));

const DELTA_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue)));
const SLOW_DELTA_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

const TARGET_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Magenta)));

/// Gaps between records above this are highlighted.
const SLOW_DELTA: Duration = Duration::from_secs(1);

struct LastRecord {
    target: String,
    time: Duration,
}

/// Perform the default logging setup used by the SERIF tools
pub fn setup() {
    builder().init();
}

/// Same as [`setup`] but does not fail when a logger is already installed.
///
/// Useful from tests, which may each try to install a logger.
pub fn try_setup() -> Result<(), log::SetLoggerError> {
    builder().try_init()
}

fn builder() -> env_logger::Builder {
    let start_time = Instant::now();
    let last = Mutex::new(LastRecord {
        target: String::new(),
        time: Duration::ZERO,
    });

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or(LOG_ENV, "info")
            .write_style(LOG_STYLE_ENV),
    );
    builder.format(move |buf, record| {
        use std::io::Write;

        let timestamp = start_time.elapsed();
        let level = record.level();
        let target = record.target();

        let mut last = last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let delta = timestamp.saturating_sub(last.time);
        last.time = timestamp;

        if target != last.target {
            last.target.clear();
            last.target.push_str(target);

            writeln!(
                buf,
                "{} {}",
                format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
                format_args!("{style}{target}{style:#}", style = TARGET_STYLE)
            )?;
        }
        writeln!(
            buf,
            "{} {} {} {}",
            format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
            format_args!(
                "{style}+{delta:<9.2?}{style:#}",
                style = if delta > SLOW_DELTA {
                    SLOW_DELTA_STYLE
                } else {
                    DELTA_STYLE
                }
            ),
            format_args!(
                "{style}{level}{style:#}",
                style = buf.default_level_style(level),
            ),
            record.args(),
        )
    });
    builder
}
