use tracing_subscriber::EnvFilter;


#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = flock::command::run().await {
        eprintln!("flock: {}", err);
        std::process::exit(1);
    }
    // A stdin reader may still be parked on the terminal.
    std::process::exit(0);
}
