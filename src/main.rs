use log::error;

/// Info by default; `RUST_LOG` overrides.
fn setup_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn main() {
    setup_logging();

    if let Err(e) = usage_warden::run() {
        error!("usage-warden failed: {e}");
        std::process::exit(1);
    }
}
