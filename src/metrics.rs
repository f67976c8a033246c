use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and register all application metrics.
/// With `listen` set, the scrape endpoint is served on that address;
/// otherwise metrics are recorded but not exposed.
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<(), BuildError> {
    let builder = PrometheusBuilder::new();
    match listen {
        Some(addr) => builder.with_http_listener(addr).install()?,
        None => {
            builder.install_recorder()?;
        }
    }

    // Pre-register counters so they appear even before the first increment.
    counter!("signals_received").absolute(0);
    counter!("signals_parsed").absolute(0);
    counter!("signals_invalid").absolute(0);
    counter!("orders_placed").absolute(0);
    counter!("orders_rejected").absolute(0);
    counter!("orders_transport_failed").absolute(0);
    counter!("trigger_orders_placed").absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!("dispatch_latency_seconds").record(0.0);

    Ok(())
}
