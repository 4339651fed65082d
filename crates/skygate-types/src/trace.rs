//! W3C TraceContext propagation.
//!
//! The trace middleware parses an inbound `traceparent`, mints a child span
//! id, and installs the context in a task-local so the PDS adapter can
//! attach it to outbound XRPC calls without threading it through every
//! trait method.

use rand::Rng;

tokio::task_local! {
	static CURRENT_TRACE: TraceContext;
}

#[derive(Clone, Debug)]
pub struct TraceContext {
	/// 16-byte trace id, lowercase hex
	pub trace_id: Box<str>,
	/// 8-byte span id of the gateway's own request span, lowercase hex
	pub span_id: Box<str>,
	/// Span id of the caller's span, when one was propagated inbound
	pub parent_span_id: Option<Box<str>>,
	pub sampled: bool,
}

fn random_hex(bytes: usize) -> String {
	let mut rng = rand::rng();
	let mut out = String::with_capacity(bytes * 2);
	for _ in 0..bytes {
		out.push_str(&format!("{:02x}", rng.random::<u8>()));
	}
	out
}

impl TraceContext {
	/// A fresh root context for a request with no inbound traceparent
	pub fn new_root() -> Self {
		TraceContext {
			trace_id: random_hex(16).into(),
			span_id: random_hex(8).into(),
			parent_span_id: None,
			sampled: true,
		}
	}

	/// Parse a `traceparent` header (version 00) and mint a child span.
	///
	/// Malformed values yield `None`; the caller starts a new root trace.
	pub fn from_traceparent(header: &str) -> Option<Self> {
		let mut parts = header.trim().split('-');
		let version = parts.next()?;
		let trace_id = parts.next()?;
		let parent_span_id = parts.next()?;
		let flags = parts.next()?;

		if version != "00"
			|| trace_id.len() != 32
			|| parent_span_id.len() != 16
			|| flags.len() != 2
			|| !trace_id.chars().all(|c| c.is_ascii_hexdigit())
			|| !parent_span_id.chars().all(|c| c.is_ascii_hexdigit())
			|| trace_id.chars().all(|c| c == '0')
		{
			return None;
		}

		let sampled = u8::from_str_radix(flags, 16).ok()? & 0x01 != 0;
		Some(TraceContext {
			trace_id: trace_id.to_ascii_lowercase().into(),
			span_id: random_hex(8).into(),
			parent_span_id: Some(parent_span_id.to_ascii_lowercase().into()),
			sampled,
		})
	}

	/// The `traceparent` value identifying the gateway's span
	pub fn to_traceparent(&self) -> String {
		format!(
			"00-{}-{}-{}",
			self.trace_id,
			self.span_id,
			if self.sampled { "01" } else { "00" }
		)
	}
}

/// Run `fut` with `ctx` installed as the current trace context
pub async fn with_trace<F: Future>(ctx: TraceContext, fut: F) -> F::Output {
	CURRENT_TRACE.scope(ctx, fut).await
}

/// The current context, when running inside [`with_trace`]
pub fn current() -> Option<TraceContext> {
	CURRENT_TRACE.try_with(Clone::clone).ok()
}

/// The `traceparent` to attach to an outbound request, if a trace is active
pub fn current_traceparent() -> Option<String> {
	current().map(|ctx| ctx.to_traceparent())
}


// vim: ts=4
