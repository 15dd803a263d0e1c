use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::LevelFilter;
use log::Level;
use env_logger::{Builder, Env, fmt::Color};
use std::io::Write;
use once_cell::sync::OnceCell;

static INSTANCE: OnceCell<Logger> = OnceCell::new();

/// Environment variable overriding the command line verbosity, e.g. `TRIOGEN_LOG=window=trace`
pub const LOG_ENV: &str = "TRIOGEN_LOG";

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}); ETA: {eta_precise}; {per_sec} {msg}";

#[derive(Debug)]
pub struct Logger {
    multi_pg: MultiProgress,
}


impl Logger {

    /// Initialize the global logger. Subsequent calls only update the max log level.
    ///
    /// # Arguments:
    /// - `verbosity`: 0 (errors only) to 4+ (trace). See [`Logger::u8_to_loglevel`]
    pub fn init(verbosity: u8) {
        if INSTANCE.get().is_some() {
            Self::set_level(verbosity);
            return
        }

        let log_level = Self::u8_to_loglevel(verbosity);
        let env = Env::default()
            .filter(LOG_ENV);

        let logger = Builder::new().filter_level(log_level)
            .format(|buf, record| {
                let (traceback, set_intensity) = match record.level() {
                    Level::Error => (format!("(@ {}:{}) ", record.file().unwrap_or("unknown"), record.line().unwrap_or(0)), true),
                    _            => (String::new(), false),
                };

                let mut arg_style = buf.style();
                arg_style.set_intense(set_intensity);

                let mut level_style = buf.style();
                let color = match record.level() {
                    Level::Error => Color::Red,
                    Level::Warn  => Color::Yellow,
                    Level::Info  => Color::Green,
                    Level::Debug => Color::Blue,
                    Level::Trace => Color::Cyan
                };
                level_style.set_color(color).set_bold(true);

                writeln!(
                    buf,
                    "[{} {: <5} {}] {traceback}{}",
                    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                    level_style.value(record.level()),
                    record.target(),
                    arg_style.value(record.args())
                )
            })
            .parse_env(env)
            .build();

        // ---- Progress bar support. Log records are printed above any active bar.
        let multi_pg = MultiProgress::new();
        if let Err(e) = LogWrapper::new(multi_pg.clone(), logger).try_init() {
            eprintln!("Failed to wrap logger with multiprogress: {e}");
        }
        log::set_max_level(log_level);
        let _ = INSTANCE.set(Self{multi_pg});
    }

    fn u8_to_loglevel(verbosity: u8) -> LevelFilter {
        match verbosity {
            0            => LevelFilter::Error,
            1            => LevelFilter::Warn,
            2            => LevelFilter::Info,
            3            => LevelFilter::Debug,
            4..= u8::MAX => LevelFilter::Trace
        }
    }

    pub fn set_level(verbosity: u8) {
        log::set_max_level(Self::u8_to_loglevel(verbosity));
    }

    /// Shared progress bar container, or `None` if the logger was never initialized.
    pub fn multi() -> Option<&'static MultiProgress> {
        INSTANCE.get().map(|logger| &logger.multi_pg)
    }

    /// Create a progress bar of `len` steps, attached to the logger's `MultiProgress`.
    ///
    /// Returns a hidden bar when the logger is uninitialized, or when verbosity is below `Info`.
    pub fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
        let Some(multi) = Self::multi().filter(|_| log::max_level() >= LevelFilter::Info) else {
            return ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::hidden())
        };
        let pb = ProgressBar::new(len)
            .with_style(Self::progress_style())
            .with_message(message);
        multi.add(pb)
    }

    fn progress_style() -> ProgressStyle {
        ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}%", state.fraction() * 100.0);
            })
            .with_key("per_sec", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.0} variants/s", state.per_sec());
            })
            .progress_chars("##-")
    }
}
