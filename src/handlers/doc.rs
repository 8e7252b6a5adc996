//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the exporter.

use axum::{extract::State, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");

    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let doc = format!(
        r#"HERAKLES PROCESS CPU EXPORTER - DOCUMENTATION
=============================================

VERSION: {}
DESCRIPTION: Prometheus exporter for per-thread CPU time and utilization of the running process

HTTP ENDPOINTS
--------------
GET /metrics     - Prometheus metrics endpoint (each scrape samples the process's threads)
GET /health      - Health check with internal statistics (plain text)
GET /doc         - This documentation (plain text)

AVAILABLE METRICS
-----------------
system_cpu_time_seconds_total{{state="user"|"system"}}  - Accumulated CPU time of the
                                                        process's threads. Advanced by the
                                                        full current total on every scrape,
                                                        not by a delta.
system_cpu_utilization_percent{{state="user"}}          - Utilization summed over non-idle
                                                        threads; exceeds 100 on multi-core
                                                        activity.
herakles_proc_cpu_sample_failures_total                 - Sampling cycles lost to thread
                                                        enumeration failure.
herakles_proc_cpu_scrape_duration_seconds               - Duration of the previous scrape.

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. System config: /etc/herakles/proc-cpu-exporter.yaml
3. Current directory: ./herakles-proc-cpu-exporter.yaml

Key configuration options:
- port: HTTP listen port (default: 9217)
- bind: Bind address (default: 0.0.0.0)
- log_level: off/error/warn/info/debug/trace (default: info)
- enable_health / enable_doc / enable_telemetry: endpoint and telemetry toggles
- tls_cert_file / tls_key_file: serve HTTPS when both are set

{}
"#,
        version, FOOTER_TEXT
    );

    ([("Content-Type", "text/plain; charset=utf-8")], doc)
}
