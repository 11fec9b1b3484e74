use clap::Parser;
use tracing_subscriber::EnvFilter;

use reloadserve::{Config, DevServer, Server};

fn main() {
    let config = Config::parse();

    // --verbose shows connection and reload activity, otherwise use RUST_LOG or
    // stay quiet apart from warnings.
    let filter = if config.verbose {
        EnvFilter::new("reloadserve=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = match Server::try_bind(config.addr()) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("Error: cannot listen on {}: {err}", config.addr());
            std::process::exit(1);
        }
    };

    if !config.root.is_dir() {
        tracing::warn!(root = %config.root.display(), "served root is not a directory yet");
    }

    println!(
        "Serving {} on port {} with live reload...",
        config.root.display(),
        config.port
    );

    if let Err(err) = server.serve(DevServer::new(&config)) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
