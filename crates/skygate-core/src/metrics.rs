//! Prometheus metrics for the request pipeline.

use prometheus::{
	Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
	TextEncoder,
};

use skygate_types::prelude::*;

#[derive(Clone, Debug)]
pub struct Metrics {
	registry: Registry,
	requests_total: IntCounterVec,
	request_duration: HistogramVec,
	active_requests: IntGauge,
	errors_total: IntCounter,
}

impl Metrics {
	pub fn new() -> SgResult<Self> {
		let registry = Registry::new();

		let requests_total = IntCounterVec::new(
			Opts::new("http_server_requests_total", "Total HTTP requests served"),
			&["method", "route", "status"],
		)
		.map_err(|e| Error::Internal(format!("metric registration: {}", e)))?;
		let request_duration = HistogramVec::new(
			HistogramOpts::new(
				"http_server_request_duration_seconds",
				"HTTP request duration in seconds",
			),
			&["method", "route"],
		)
		.map_err(|e| Error::Internal(format!("metric registration: {}", e)))?;
		let active_requests =
			IntGauge::new("http_server_active_requests", "In-flight HTTP requests")
				.map_err(|e| Error::Internal(format!("metric registration: {}", e)))?;
		let errors_total =
			IntCounter::new("http_server_errors_total", "HTTP responses with non-2xx status")
				.map_err(|e| Error::Internal(format!("metric registration: {}", e)))?;

		for collector in [
			Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
			Box::new(request_duration.clone()),
			Box::new(active_requests.clone()),
			Box::new(errors_total.clone()),
		] {
			registry
				.register(collector)
				.map_err(|e| Error::Internal(format!("metric registration: {}", e)))?;
		}

		Ok(Metrics { registry, requests_total, request_duration, active_requests, errors_total })
	}

	pub fn request_started(&self) {
		self.active_requests.inc();
	}

	pub fn request_finished(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
		self.active_requests.dec();
		self.requests_total.with_label_values(&[method, route, &status.to_string()]).inc();
		self.request_duration.with_label_values(&[method, route]).observe(duration_secs);
		if !(200..300).contains(&status) {
			self.errors_total.inc();
		}
	}

	/// Render the registry in the Prometheus text exposition format
	pub fn render(&self) -> SgResult<String> {
		let mut buffer = Vec::new();
		let encoder = TextEncoder::new();
		encoder
			.encode(&self.registry.gather(), &mut buffer)
			.map_err(|e| Error::Internal(format!("metric encoding: {}", e)))?;
		String::from_utf8(buffer).map_err(|_| Error::Parse)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_request_lifecycle() {
		let metrics = Metrics::new().unwrap();

		metrics.request_started();
		metrics.request_finished("GET", "/api/v1/timelines/home", 200, 0.05);
		metrics.request_started();
		metrics.request_finished("POST", "/api/v1/statuses", 422, 0.01);

		let text = metrics.render().unwrap();
		assert!(text.contains("http_server_requests_total"));
		assert!(text.contains("route=\"/api/v1/statuses\""));
		assert!(text.contains("status=\"422\""));
		assert!(text.contains("http_server_errors_total 1"));
		assert!(text.contains("http_server_active_requests 0"));
	}

	#[test]
	fn test_error_counter_only_non_2xx() {
		let metrics = Metrics::new().unwrap();
		metrics.request_started();
		metrics.request_finished("GET", "/healthz", 204, 0.001);
		let text = metrics.render().unwrap();
		assert!(text.contains("http_server_errors_total 0"));
	}
}

// vim: ts=4
