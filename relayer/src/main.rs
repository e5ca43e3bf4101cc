extern crate pretty_env_logger;

use clap::Parser;
use pretty_env_logger::env_logger::fmt::TimestampPrecision;
use tokio_util::sync::CancellationToken;

use relayer::{
    cli::{Cli, CliCommands},
    import_execution_header,
};

#[tokio::main]
async fn main() {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(Some(TimestampPrecision::Seconds))
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Received Ctrl-C, cancelling");
                cancel.cancel();
            }
        }
    });

    let result = match cli.command {
        CliCommands::ImportExecutionHeader(args) => {
            import_execution_header::run(args, cancel).await
        }
    };

    if let Err(e) = result {
        log::error!("{e:?}");
        std::process::exit(1);
    }
}
