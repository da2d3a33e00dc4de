//! Confirmation codes and status links returned to Facebook.

use rand::{distributions::Uniform, prelude::*};
use url::Url;

/// Length of the random suffix of a confirmation code.
const SUFFIX_LEN: usize = 6;

/// Lowercase base36 alphabet for the suffix.
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Path of the human-readable status page.
pub const STATUS_PATH: &str = "/deletion-status";

/// Generate a confirmation code: `del_<unix millis>_<6 base36 chars>`.
///
/// Uniqueness rests on the timestamp plus 36^6 random suffixes; the store is not consulted.
pub fn generate_confirmation_code() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = thread_rng();
    let dist = Uniform::from(0..SUFFIX_ALPHABET.len());
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[dist.sample(&mut rng)] as char)
        .collect();

    format!("del_{}_{}", millis, suffix)
}

/// Build `<base>/deletion-status?code=<code>`.
///
/// Any path on the base URL is kept, so the service can live under a prefix.
pub fn status_url(base_url: &Url, code: &str) -> String {
    let mut url = base_url.clone();
    let path = format!("{}{}", url.path().trim_end_matches('/'), STATUS_PATH);
    url.set_path(&path);
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("code", code);
    url.to_string()
}
