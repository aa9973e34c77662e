use reservation_app::app::{run, AppConfig};

fn main() {
    tracing_subscriber::fmt::init();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(config) {
        tracing::error!(err = %format!("{err:#}"), "notifier terminated");
        std::process::exit(1);
    }
}
