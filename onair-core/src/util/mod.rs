mod id;

pub use id::*;

use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Returns a lowercase alphanumeric string of the given length
pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .map(|c| c.to_ascii_lowercase())
        .take(length)
        .collect()
}

/// Milliseconds since the unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generates a user id like `viewer_1718000000000_k3j9xa`
pub fn generated_user_id(prefix: &str) -> String {
    format!("{}_{}_{}", prefix, now_millis(), random_string(6))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generated_user_id() {
        let id = generated_user_id("viewer");
        let parts: Vec<_> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "viewer");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
