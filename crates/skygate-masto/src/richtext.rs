//! Bluesky rich text → HTML fragment rendering.
//!
//! Facet indices are byte offsets into the UTF-8 encoding of the text,
//! never character offsets; slicing goes through `str::get` so a facet
//! that lands inside a multi-byte sequence degrades to plain text instead
//! of corrupting the output.

use skygate_types::pds_adapter::{Facet, FacetFeature};

/// Escape text for an HTML text node or attribute value
pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(c),
		}
	}
	out
}

fn push_literal(out: &mut String, text: &str) {
	for segment in split_segments(text) {
		match segment {
			Segment::Text(t) => out.push_str(&escape_html(t)),
			Segment::Newline => out.push_str("<br>"),
		}
	}
}

enum Segment<'a> {
	Text(&'a str),
	Newline,
}

// Split literal text on '\n' while keeping the separators as segments
fn split_segments(text: &str) -> Vec<Segment<'_>> {
	let mut segments = Vec::new();
	let mut rest = text;
	while let Some(pos) = rest.find('\n') {
		if pos > 0 {
			segments.push(Segment::Text(&rest[..pos]));
		}
		segments.push(Segment::Newline);
		rest = &rest[pos + 1..];
	}
	if !rest.is_empty() {
		segments.push(Segment::Text(rest));
	}
	segments
}

fn push_feature(out: &mut String, feature: &FacetFeature, visible: &str) {
	match feature {
		FacetFeature::Link { uri } => {
			out.push_str("<a href=\"");
			out.push_str(&escape_html(uri));
			out.push_str("\" target=\"_blank\" rel=\"nofollow noopener noreferrer\">");
			out.push_str(&escape_html(visible));
			out.push_str("</a>");
		}
		FacetFeature::Mention { .. } => {
			// The DID primes the ID mapping elsewhere; the HTML carries the handle
			let handle = visible.strip_prefix('@').unwrap_or(visible);
			out.push_str("<span class=\"h-card\"><a href=\"https://bsky.app/profile/");
			out.push_str(&escape_html(handle));
			out.push_str("\" class=\"u-url mention\">@");
			out.push_str(&escape_html(handle));
			out.push_str("</a></span>");
		}
		FacetFeature::Tag { tag } => {
			out.push_str("<a href=\"https://bsky.app/hashtag/");
			out.push_str(&escape_html(tag));
			out.push_str("\" class=\"mention hashtag\">#");
			out.push_str(&escape_html(tag));
			out.push_str("</a>");
		}
		FacetFeature::Unknown => out.push_str(&escape_html(visible)),
	}
}

/// Render post text with its facets as a single `<p>…</p>` fragment
pub fn render_facets(text: &str, facets: &[Facet]) -> String {
	let mut sorted: Vec<&Facet> = facets.iter().collect();
	sorted.sort_by_key(|f| f.index.byte_start);

	let mut out = String::with_capacity(text.len() + 16);
	out.push_str("<p>");

	let mut cursor = 0usize;
	for facet in sorted {
		let start = facet.index.byte_start;
		let end = facet.index.byte_end.min(text.len());
		// Overlapping or zero-length facets contribute nothing extra
		if start < cursor || start >= end {
			continue;
		}
		// Both offsets must land on char boundaries; otherwise treat the
		// facet as invalid and let its bytes render as plain text
		let Some(visible) = text.get(start..end) else { continue };
		let Some(leading) = text.get(cursor..start) else { continue };

		push_literal(&mut out, leading);
		match facet.features.first() {
			Some(feature) => push_feature(&mut out, feature, visible),
			None => push_literal(&mut out, visible),
		}
		cursor = end;
	}

	if let Some(trailing) = text.get(cursor..) {
		push_literal(&mut out, trailing);
	}

	out.push_str("</p>");
	out
}

/// Render facet-less text (profile notes): escape + paragraph wrap
pub fn render_plain(text: &str) -> String {
	render_facets(text, &[])
}

#[cfg(test)]
mod tests {
	use super::*;
	use skygate_types::pds_adapter::ByteSlice;

	fn facet(start: usize, end: usize, feature: FacetFeature) -> Facet {
		Facet { index: ByteSlice { byte_start: start, byte_end: end }, features: vec![feature] }
	}

	#[test]
	fn test_empty_text() {
		assert_eq!(render_plain(""), "<p></p>");
	}

	#[test]
	fn test_plain_text_escaped() {
		assert_eq!(
			render_plain("a < b & c > \"d\""),
			"<p>a &lt; b &amp; c &gt; &quot;d&quot;</p>"
		);
	}

	#[test]
	fn test_newlines_become_br() {
		assert_eq!(render_plain("one\ntwo\n\nthree"), "<p>one<br>two<br><br>three</p>");
	}

	#[test]
	fn test_link_facet() {
		let text = "see https://example.com ok";
		let facets = [facet(4, 23, FacetFeature::Link { uri: "https://example.com".into() })];
		assert_eq!(
			render_facets(text, &facets),
			"<p>see <a href=\"https://example.com\" target=\"_blank\" \
			 rel=\"nofollow noopener noreferrer\">https://example.com</a> ok</p>"
		);
	}

	#[test]
	fn test_mention_facet_with_emoji_prefix() {
		// "Hello 👋 @alice.bsky.social" — the wave is 4 UTF-8 bytes, so the
		// mention starts at byte 11 and runs to byte 29
		let text = "Hello 👋 @alice.bsky.social";
		assert_eq!(text.len(), 29);
		let facets =
			[facet(11, 29, FacetFeature::Mention { did: "did:plc:x".into() })];
		let html = render_facets(text, &facets);
		assert!(html.contains("Hello 👋 "));
		assert!(html.contains(
			"<a href=\"https://bsky.app/profile/alice.bsky.social\" \
			 class=\"u-url mention\">@alice.bsky.social</a>"
		));
		assert!(html.starts_with("<p>"));
		assert!(html.ends_with("</p>"));
	}

	#[test]
	fn test_tag_facet() {
		let text = "love #rustlang!";
		let facets = [facet(5, 14, FacetFeature::Tag { tag: "rustlang".into() })];
		assert_eq!(
			render_facets(text, &facets),
			"<p>love <a href=\"https://bsky.app/hashtag/rustlang\" \
			 class=\"mention hashtag\">#rustlang</a>!</p>"
		);
	}

	#[test]
	fn test_facet_spanning_whole_text() {
		let text = "https://example.com";
		let facets = [facet(0, 19, FacetFeature::Link { uri: "https://example.com".into() })];
		let html = render_facets(text, &facets);
		assert!(html.starts_with("<p><a "));
		assert!(html.ends_with("</a></p>"));
	}

	#[test]
	fn test_facets_at_both_ends() {
		let text = "#a mid #b";
		let facets = [
			facet(0, 2, FacetFeature::Tag { tag: "a".into() }),
			facet(7, 9, FacetFeature::Tag { tag: "b".into() }),
		];
		let html = render_facets(text, &facets);
		assert!(html.starts_with("<p><a href=\"https://bsky.app/hashtag/a\""));
		assert!(html.contains("</a> mid <a href=\"https://bsky.app/hashtag/b\""));
		assert!(html.ends_with("</a></p>"));
	}

	#[test]
	fn test_zero_length_facet_omitted() {
		let text = "plain";
		let facets = [facet(2, 2, FacetFeature::Link { uri: "https://x".into() })];
		assert_eq!(render_facets(text, &facets), "<p>plain</p>");
	}

	#[test]
	fn test_facet_inside_multibyte_sequence_degrades() {
		// Byte 7 is inside the wave emoji; the facet must not corrupt UTF-8
		let text = "Hello 👋 world";
		let facets = [facet(7, 12, FacetFeature::Link { uri: "https://x".into() })];
		let html = render_facets(text, &facets);
		assert!(html.contains("👋"));
		assert!(!html.contains("<a "));
		assert!(std::str::from_utf8(html.as_bytes()).is_ok());
	}

	#[test]
	fn test_overlapping_facets_keep_first() {
		let text = "abcdef";
		let facets = [
			facet(0, 4, FacetFeature::Tag { tag: "x".into() }),
			facet(2, 6, FacetFeature::Tag { tag: "y".into() }),
		];
		let html = render_facets(text, &facets);
		// Second facet starts inside the first and is dropped
		assert!(html.contains("hashtag/x"));
		assert!(!html.contains("hashtag/y"));
	}

	#[test]
	fn test_out_of_range_facet_clamped() {
		let text = "hi";
		let facets = [facet(0, 100, FacetFeature::Tag { tag: "x".into() })];
		let html = render_facets(text, &facets);
		assert!(html.contains("#x"));
	}

	#[test]
	fn test_escaping_inside_link_text() {
		let text = "<script>";
		let facets = [facet(0, 8, FacetFeature::Link { uri: "https://x?a=1&b=2".into() })];
		let html = render_facets(text, &facets);
		assert!(html.contains("&lt;script&gt;"));
		assert!(html.contains("https://x?a=1&amp;b=2"));
		assert!(!html.contains("<script>"));
	}
}

// vim: ts=4
