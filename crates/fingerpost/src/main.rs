use clap::Parser;
use fingerpost::Discoverer;
use fingerpost::cli::{Args, render};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    tracing::debug!(?args, "starting lookup");

    let discoverer =
        Discoverer::with_registry(reqwest::Client::new(), args.options(), args.registry());

    // Ctrl-C cancels the lookup
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let doc = discoverer
        .lookup_cancellable(&args.identifier, &token)
        .await?;
    println!("{}", render(&doc, args.format)?.trim_end());
    Ok(())
}
