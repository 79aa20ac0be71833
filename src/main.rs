use anyhow::{Context, Result};
use iamwatch::cli::{
    commands::{notify, report},
    global::Command,
    CommandLineArgs, GlobalArgs,
};
use tokio::runtime::Builder;
use tracing::debug;
use tracing_core::metadata::LevelFilter;
use tracing_subscriber::{
    self, fmt, prelude::__tracing_subscriber_SubscriberExt, registry, util::SubscriberInitExt,
};

fn main() -> Result<()> {
    color_backtrace::install();
    let args = CommandLineArgs::parse_args();

    // Tag lookups and sends are I/O bound; a small pool is plenty
    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let code = runtime.block_on(async_main(args))?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn setup_logging(global_args: &GlobalArgs) {
    let level = LevelFilter::from_level(global_args.log_level());
    let filter = if global_args.all_targets() {
        // Enable TRACE for all modules, AWS SDK included
        tracing_subscriber::filter::Targets::new().with_default(LevelFilter::TRACE)
    } else {
        tracing_subscriber::filter::Targets::new()
            .with_default(LevelFilter::ERROR)
            .with_target("iamwatch", level)
    };
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .without_time();
    registry().with(fmt_layer).with(filter).init();
}

async fn async_main(args: CommandLineArgs) -> Result<i32> {
    setup_logging(&args.global_args);
    debug!("iamwatch {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Notify(notify_args) => notify::run(&notify_args).await,
        Command::Report(report_args) => {
            report::run(&report_args).await?;
            Ok(0)
        }
    }
}
