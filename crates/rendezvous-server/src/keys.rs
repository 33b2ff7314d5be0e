use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random user key over `[a-zA-Z0-9]`, for clients that connect without one.
pub fn generate_user_key(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
