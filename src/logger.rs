use crate::error::Error;
use env_logger::{Builder, Env, Logger, Target};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

/// Sends every record to a per-run log file at debug level and to the console
/// at info level (or whatever `RUST_LOG` asks for).
pub struct DualLogger {
    file: Logger,
    console: Logger,
}

impl DualLogger {
    pub fn new(file: File) -> Self {
        let file = formatted(Builder::new())
            .filter_level(LevelFilter::Off)
            .filter_module(CRATE_NAME, LevelFilter::Debug)
            .target(Target::Pipe(Box::new(file)))
            .build();

        let console = formatted(Builder::from_env(Env::default().default_filter_or("info")))
            .target(Target::Stderr)
            .build();

        DualLogger { file, console }
    }

    fn max_level(&self) -> LevelFilter {
        self.file.filter().max(self.console.filter())
    }
}

fn formatted(mut builder: Builder) -> Builder {
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            buf.timestamp(),
            record.target(),
            record.level(),
            record.args()
        )
    });
    builder
}

impl Log for DualLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file.enabled(metadata) || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.file.log(record);
        self.console.log(record);
    }

    fn flush(&self) {
        self.file.flush();
        self.console.flush();
    }
}

/// Installs the [`DualLogger`] as the global logger, truncating
/// `{log_dir}/{crate}.log`.
pub fn init(log_dir: &str) -> Result<(), Error> {
    fs::create_dir_all(log_dir)?;
    let file = File::create(Path::new(log_dir).join(format!("{}.log", CRATE_NAME)))?;

    let logger = DualLogger::new(file);
    let max_level = logger.max_level();

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);

    Ok(())
}
