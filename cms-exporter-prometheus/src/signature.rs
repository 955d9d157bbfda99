//! Alibaba Cloud RPC request signing (signature version 1.0, HMAC-SHA1).

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::digest::{InvalidLength, KeyInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Percent-encode per RFC 3986: everything except `A-Z a-z 0-9 - _ . ~`.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sorted, encoded `k=v&k=v` query string.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `METHOD&%2F&encode(canonical query)`.
pub fn string_to_sign(method: &str, params: &BTreeMap<String, String>) -> String {
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(&canonical_query(params))
    )
}

/// Base64 HMAC-SHA1 of `string_to_sign` keyed with `secret&`.
pub fn sign(secret: &str, string_to_sign: &str) -> Result<String, InvalidLength> {
    let key = format!("{}&", secret);
    let mut mac = <HmacSha1 as KeyInit>::new_from_slice(key.as_bytes())?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the signed query string (canonical query plus `Signature`) for a GET.
pub fn signed_query(
    secret: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, InvalidLength> {
    let signature = sign(secret, &string_to_sign("GET", params))?;
    Ok(format!(
        "{}&Signature={}",
        canonical_query(params),
        percent_encode(&signature)
    ))
}
