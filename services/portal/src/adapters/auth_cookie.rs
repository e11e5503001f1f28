//! services/portal/src/adapters/auth_cookie.rs
//!
//! Encoding of the auth session into cookies.
//!
//! The session JSON is stored as `base64-<url-safe base64>`. Browsers cap a
//! single cookie at roughly 4KB, so values longer than `CHUNK_SIZE` are split
//! across `<name>.0`, `<name>.1`, ... and joined again on read.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use stadion_core::ports::{CookieOptions, CookieWrite, SessionStore};
use stadion_core::Session;
use tracing::{debug, warn};

pub const CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";

pub fn encode_session(session: &Session) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(session)?;
    Ok(format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json)))
}

/// Decodes a cookie value. Plain JSON values are accepted too.
pub fn decode_session(raw: &str) -> Option<Session> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => URL_SAFE_NO_PAD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .ok()?,
        None => raw.as_bytes().to_vec(),
    };
    match serde_json::from_slice(&json) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(error = %e, "discarding undecodable auth cookie");
            None
        }
    }
}

fn chunk_name(name: &str, index: usize) -> String {
    format!("{}.{}", name, index)
}

/// Indices of the chunk cookies currently present for `name`.
fn existing_chunks(store: &dyn SessionStore, name: &str) -> Vec<usize> {
    let prefix = format!("{}.", name);
    let mut indices: Vec<usize> = store
        .get_all()
        .into_iter()
        .filter_map(|(cookie, _)| cookie.strip_prefix(&prefix)?.parse().ok())
        .collect();
    indices.sort_unstable();
    indices
}

/// Splits `value` into the writes needed to store it under `name`.
pub fn chunk_writes(name: &str, value: &str, options: &CookieOptions) -> Vec<CookieWrite> {
    if value.len() <= CHUNK_SIZE {
        return vec![CookieWrite {
            name: name.to_string(),
            value: value.to_string(),
            options: options.clone(),
        }];
    }
    // The value is base64 plus an ASCII prefix, so byte chunks are char-aligned.
    value
        .as_bytes()
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, chunk)| CookieWrite {
            name: chunk_name(name, i),
            value: String::from_utf8_lossy(chunk).into_owned(),
            options: options.clone(),
        })
        .collect()
}

/// Reads the cookie value stored under `name`, joining chunks if needed.
pub fn read_value(store: &dyn SessionStore, name: &str) -> Option<String> {
    if let Some(value) = store.get(name) {
        return Some(value);
    }
    let mut joined = String::new();
    for i in 0.. {
        match store.get(&chunk_name(name, i)) {
            Some(part) => joined.push_str(&part),
            None => break,
        }
    }
    (!joined.is_empty()).then_some(joined)
}

pub fn read_session(store: &dyn SessionStore, name: &str) -> Option<Session> {
    read_value(store, name).and_then(|raw| decode_session(&raw))
}

/// Stores `value` under `name`, clearing whatever layout was there before.
/// Returns `false` if the store refused any write.
pub fn write_value(store: &dyn SessionStore, name: &str, value: &str, options: &CookieOptions) -> bool {
    let writes = chunk_writes(name, value, options);
    let expired = options.expired();
    let mut ok = store.try_set_all(&writes);

    let written: Vec<&str> = writes.iter().map(|w| w.name.as_str()).collect();
    if store.get(name).is_some() && !written.contains(&name) {
        ok &= store.try_remove(name, &expired);
    }
    for index in existing_chunks(store, name) {
        let stale = chunk_name(name, index);
        if !written.contains(&stale.as_str()) {
            ok &= store.try_remove(&stale, &expired);
        }
    }
    if !ok {
        debug!(cookie = name, "auth cookie write refused by this context");
    }
    ok
}

pub fn write_session(
    store: &dyn SessionStore,
    name: &str,
    session: &Session,
    options: &CookieOptions,
) -> bool {
    match encode_session(session) {
        Ok(value) => write_value(store, name, &value, options),
        Err(e) => {
            warn!(error = %e, "failed to encode session");
            false
        }
    }
}

/// Removes the cookie and all of its chunks.
pub fn clear(store: &dyn SessionStore, name: &str, options: &CookieOptions) -> bool {
    let expired = options.expired();
    let mut ok = true;
    if store.get(name).is_some() {
        ok &= store.try_remove(name, &expired);
    }
    for index in existing_chunks(store, name) {
        ok &= store.try_remove(&chunk_name(name, index), &expired);
    }
    ok
}
