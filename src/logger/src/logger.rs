use log::{Level, LevelFilter};
use env_logger::{Builder, Env, fmt::Color};
use std::io::Write;

/// Initialize the global logger at the given verbosity count (`-v`, `-vv`, `-vvv`, ...).
/// Respects the `SHARDER_LOG` environment variable override, matching `env_logger`'s
/// usual `RUST_LOG`-style filtering but scoped to this binary.
pub fn init(verbosity: u8) {
    let log_level = u8_to_loglevel(verbosity);
    let env = Env::default().filter("SHARDER_LOG");

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            let traceback = if record.level() == LevelFilter::Error {
                format!("(@ {}:{}) ", record.file().unwrap_or("unknown"), record.line().unwrap_or(0))
            } else {
                String::new()
            };

            let mut level_style = buf.style();
            let color = match record.level() {
                Level::Error => Color::Red,
                Level::Warn  => Color::Yellow,
                Level::Info  => Color::Green,
                Level::Debug => Color::Blue,
                Level::Trace => Color::Cyan,
            };
            level_style.set_color(color).set_bold(true);

            writeln!(
                buf,
                "[{} {: <5} {}] {traceback}{}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                level_style.value(record.level()),
                record.target(),
                record.args()
            )
        })
        .parse_env(env)
        .try_init()
        .ok();
}

fn u8_to_loglevel(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        4..=u8::MAX => LevelFilter::Trace,
    }
}

pub fn set_level(verbosity: u8) {
    log::set_max_level(u8_to_loglevel(verbosity));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_expected_level() {
        init(0);
        for level in 0..u8::MAX {
            set_level(level);
            let expected = match level {
                0 => LevelFilter::Error,
                1 => LevelFilter::Warn,
                2 => LevelFilter::Info,
                3 => LevelFilter::Debug,
                4..=u8::MAX => LevelFilter::Trace,
            };
            assert_eq!(log::max_level(), expected);
        }
    }
}
