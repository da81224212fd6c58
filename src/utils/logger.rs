use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("groundwater_recharge=debug,info")
        } else {
            EnvFilter::new("groundwater_recharge=info")
        }
    })
}

fn cli_subscriber(verbose: bool) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(default_filter(verbose)).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .compact(),
    )
}

fn json_subscriber(verbose: bool) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(default_filter(verbose)).with(
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .json()
            .with_current_span(true),
    )
}

pub fn init_cli_logger(verbose: bool) {
    cli_subscriber(verbose).init();
}

/// JSON lines on stdout, for runs whose logs are collected by another system.
pub fn init_json_logger(verbose: bool) {
    json_subscriber(verbose).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_accept_events_inside_spans() {
        tracing::subscriber::with_default(json_subscriber(true), || {
            let span = tracing::info_span!("region", name = "north");
            let _guard = span.enter();
            tracing::info!(months = 12, "balance finished");
        });
        tracing::subscriber::with_default(cli_subscriber(false), || {
            tracing::warn!("no overlap");
        });
    }
}
