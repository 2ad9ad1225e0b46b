//! Client-side request and refresh counters
//!
//! - `api_client_requests_total` (counter): labels `service`, `status`
//! - `api_client_token_refresh_total` (counter): label `outcome`
//!
//! No recorder is installed by the library; without one these calls are
//! no-ops.

/// Record one HTTP exchange. Transport failures use status `0`.
pub fn record_request(service: &str, status: u16) {
    metrics::counter!(
        "api_client_requests_total",
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a completed refresh attempt (`success` or `failure`).
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("api_client_token_refresh_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("profile", 200);
        record_refresh("success");
    }

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("profile", 401);
        record_request("media", 200);
        record_refresh("failure");

        let output = handle.render();
        assert!(output.contains("api_client_requests_total"), "{output}");
        assert!(output.contains("service=\"profile\""), "{output}");
        assert!(output.contains("status=\"401\""), "{output}");
        assert!(output.contains("service=\"media\""), "{output}");
        assert!(
            output.contains("api_client_token_refresh_total{outcome=\"failure\"} 1"),
            "{output}"
        );
    }
}
