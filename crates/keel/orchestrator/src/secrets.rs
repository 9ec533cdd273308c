//! Generated secrets

use rand::distributions::Alphanumeric;
use rand::Rng;

const PASSWORD_LEN: usize = 12;

/// Random alphanumeric password
pub fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// `previous` when set and non-empty, else a fresh password
pub fn keep_or_generate(previous: Option<&serde_json::Value>) -> String {
    previous
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(random_password)
}
