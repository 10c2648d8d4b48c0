use std::time::Duration;

/// Tunables shared by the room registry, the session actor and the claim flow
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a bullet stays on screen before it is removed
    pub bullet_lifetime: Duration,
    /// How often a session refreshes its viewer list from the roster
    pub roster_poll_interval: Duration,
    /// The shortest completed session that qualifies for a claim
    pub eligibility_threshold: Duration,
    /// How many persisted messages are returned as history
    pub message_history_limit: usize,
    /// How long a minted engine token stays valid
    pub token_effective_time: Duration,
    /// The longest chat message accepted from a user
    pub max_message_length: usize,
}

impl Config {
    /// The eligibility threshold in whole seconds
    pub fn eligibility_threshold_in_seconds(&self) -> i64 {
        self.eligibility_threshold.as_secs() as i64
    }

    /// The token lifetime in whole seconds
    pub fn token_effective_time_in_seconds(&self) -> i64 {
        self.token_effective_time.as_secs() as i64
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Long enough for the float-up animation to finish
            bullet_lifetime: Duration::from_secs(4),
            roster_poll_interval: Duration::from_secs(5),
            // Two minutes of streaming or watching
            eligibility_threshold: Duration::from_secs(120),
            message_history_limit: 50,
            token_effective_time: Duration::from_secs(60 * 60),
            max_message_length: 100,
        }
    }
}
