use clap::Parser;

mod commands;

/// Used when RUST_LOG is unset.
const DEFAULT_LOG_FILTER: &str = "info,queuescale=debug";

/// Reclaim idle fleet members and resize the fleet to the queue backlog.
///
/// Runs a single cycle and exits; schedule it externally (cron, systemd
/// timer, ...). Optional settings are read from the TOML file named by
/// QUEUESCALE_CONFIG; the queue name defaults to CELERY_DEFAULT_QUEUE or
/// "celery".
#[derive(Parser)]
#[command(name = "queuescale", version)]
struct Cli {
    /// Auto Scaling group holding the worker machines.
    fleet_name: String,
    /// Broker monitoring URL (Flower API), e.g. http://flower:5555
    ///
    /// Queue depth and worker activity are read over Flower's HTTP API, so
    /// this must be an http:// URL. A Celery broker URL such as amqp://...
    /// is not accepted.
    broker_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
            }),
        )
        .init();

    let cli = Cli::parse();
    commands::run::run(&cli.fleet_name, &cli.broker_url).await
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn takes_two_positionals() {
        let cli = Cli::try_parse_from(["queuescale", "workers", "http://flower:5555"]).unwrap();
        assert_eq!(cli.fleet_name, "workers");
        assert_eq!(cli.broker_url, "http://flower:5555");

        assert!(Cli::try_parse_from(["queuescale", "workers"]).is_err());
        assert!(Cli::try_parse_from(["queuescale", "--dry-run", "workers", "http://f"]).is_err());
    }

    #[test]
    fn default_filter_keeps_info_for_every_target() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        assert!(DEFAULT_LOG_FILTER.starts_with("info,"));
    }

    #[test]
    fn help_names_the_accepted_broker_url() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("http://"));
        assert!(help.contains("amqp://"));
    }
}
