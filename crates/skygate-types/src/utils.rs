//! Utility functions

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::prelude::*;

pub const SAFE: [char; 62] = [
	'0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
	'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
	'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
	'V', 'W', 'X', 'Y', 'Z',
];

/// Client identifier length (~95 bits of entropy)
pub const CLIENT_ID_LENGTH: usize = 16;
/// Secret / code / bearer token length (~256 bits of entropy)
pub const TOKEN_LENGTH: usize = 43;

/// Generate a random identifier over the URL-safe alphabet
pub fn random_id(length: usize) -> String {
	let mut rng = rand::rng();
	let mut result = String::with_capacity(length);

	for _ in 0..length {
		result.push(SAFE[rng.random_range(0..SAFE.len())]);
	}
	result
}

/// Generate an opaque credential (client secret, authorization code, bearer token)
pub fn random_token() -> String {
	random_id(TOKEN_LENGTH)
}

/// Decode a JWT payload without verifying the signature.
///
/// WARNING: never use this for authentication decisions on inbound tokens.
/// The gateway only peeks at upstream-issued session JWTs to see whether
/// they need a refresh; the PDS remains the authority on their validity.
pub fn decode_jwt_no_verify<T: DeserializeOwned>(jwt: &str) -> SgResult<T> {
	let mut parts = jwt.splitn(3, '.');
	let _header = parts.next().ok_or(Error::Parse)?;
	let payload = parts.next().ok_or(Error::Parse)?;
	let _sig = parts.next().ok_or(Error::Parse)?;
	let payload = URL_SAFE_NO_PAD.decode(payload.as_bytes()).map_err(|_| Error::Parse)?;
	let payload: T = serde_json::from_slice(&payload).map_err(|_| Error::Parse)?;
	Ok(payload)
}

#[derive(Deserialize)]
struct ExpClaim {
	exp: i64,
}

/// Whether a JWT's `exp` claim is within `leeway` seconds of expiry.
///
/// Unparseable tokens count as expired so the caller falls through to a
/// refresh attempt.
pub fn jwt_expires_within(jwt: &str, leeway: i64) -> bool {
	match decode_jwt_no_verify::<ExpClaim>(jwt) {
		Ok(claim) => claim.exp <= Timestamp::now().0 + leeway,
		Err(_) => true,
	}
}


// vim: ts=4
