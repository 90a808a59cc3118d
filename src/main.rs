use std::{
    fs,
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use bot::Bot;
use cfg::{expand_path, Config, ConfigStore};
use log::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

mod announce;
mod bot;
mod cfg;
mod commands;
mod discord;
mod error;

const LOG_FILE_PREFIX: &str = "announce-bot";
const LOG_FILE_SUFFIX: &str = "log";
/// Rotated log files kept on disk, the oldest are deleted.
const LOG_FILES_KEPT: usize = 5;

/// Copies every log record to stderr and to the log file.
struct Tee {
    file: RollingFileAppender,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Daily rotated `announce-bot.<date>.log` files in `dir`, created when missing.
fn log_file_writer(dir: &Path) -> Result<RollingFileAppender, anyhow::Error> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create the log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(LOG_FILES_KEPT)
        .build(dir)
        .context("failed to open the log file")
}

fn init_logger(config: &Config) -> Result<(), anyhow::Error> {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));

    if let Some(dir) = &config.log_dir {
        let file = log_file_writer(&expand_path(dir))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    builder.try_init()?;
    Ok(())
}

#[tokio::main]
/// Entrypoint for the announcement bot.
/// Every week it asks a role what the next meetup will be, collects the reactions
/// and posts the matching announcement.
async fn main() -> Result<(), anyhow::Error> {
    // load the config
    let config = Arc::new(Config::from_env().context("failed to read the environment")?);
    init_logger(&config)?;

    let store = ConfigStore::open(
        &expand_path(&config.config_path),
        &expand_path(&config.config_overrides_path),
        config.role_overrides(),
    )
    .context("failed to load the configuration")?;
    info!("schedule: {:?}", store.load());

    let bot = Bot::new(config, store).await?;
    bot.start().await
}
