//! Claim rules shared by the stats endpoint and the client claim flow.
//! The claim itself is settled by an external contract.

use chrono::{DateTime, Utc};

/// The daily claim contract the reward transaction is sent to
pub const DAILY_CLAIM_CONTRACT: &str = "0x0e72291f013cccf516a89381dd3966feedc63ef6";
/// `claim()` function selector
pub const CLAIM_SELECTOR: &str = "0x379607f5";
/// Decimals of the reward token
pub const TOKEN_DECIMALS: u32 = 18;

pub const INELIGIBLE_MESSAGE: &str =
    "You need to stream or watch for at least 2 minutes to claim tokens.";

const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Known revert strings and wallet errors, checked in order
const KNOWN_ERRORS: [(&str, &str); 12] = [
    (
        "DailyClaim: claim too soon",
        "You've already claimed today. Come back tomorrow!",
    ),
    ("DailyClaim: paused", "Claiming is temporarily disabled"),
    (
        "DailyClaim: zero token address",
        "Contract configuration error",
    ),
    ("DailyClaim: only admin", "Admin only function"),
    ("DailyClaim: interval too small", "Invalid claim interval"),
    ("DailyClaim: zero address", "Invalid address"),
    ("DailyClaim: recovery failed", "Token recovery failed"),
    ("User rejected the transaction", "Transaction cancelled"),
    ("User rejected the request", "Request cancelled"),
    ("insufficient funds", "Insufficient funds for transaction"),
    ("network error", "Network error. Please try again."),
    ("unknown error", DEFAULT_ERROR_MESSAGE),
];

/// Turns a raw wallet or contract error into something a user can read
pub fn describe_claim_error(raw: &str) -> &'static str {
    if let Some((_, message)) = KNOWN_ERRORS.iter().find(|(known, _)| raw.contains(known)) {
        return message;
    }

    if raw.contains("User rejected") || raw.contains("User denied") {
        return "Transaction cancelled";
    }

    if raw.contains("network") || raw.contains("connection") {
        return "Network error. Please try again.";
    }

    DEFAULT_ERROR_MESSAGE
}

/// Formats a raw token amount with [TOKEN_DECIMALS] decimals, trimming trailing zeros
pub fn format_token_amount(amount: u128) -> String {
    let unit = 10u128.pow(TOKEN_DECIMALS);
    let whole = amount / unit;
    let fraction = amount % unit;

    if fraction == 0 {
        return whole.to_string();
    }

    let fraction = format!("{:0width$}", fraction, width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Returns the length of a completed session in seconds
pub fn session_duration(joined_at: DateTime<Utc>, left_at: DateTime<Utc>) -> i64 {
    (left_at - joined_at).num_seconds()
}

/// Returns true if a completed session is long enough to claim
pub fn is_eligible_session(
    joined_at: DateTime<Utc>,
    left_at: DateTime<Utc>,
    threshold_in_seconds: i64,
) -> bool {
    session_duration(joined_at, left_at) >= threshold_in_seconds
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_contract_errors_win() {
        assert_eq!(
            describe_claim_error("execution reverted: DailyClaim: claim too soon"),
            "You've already claimed today. Come back tomorrow!"
        );
        assert_eq!(
            describe_claim_error("User rejected the request."),
            "Request cancelled"
        );
        assert_eq!(
            describe_claim_error("User denied transaction signature"),
            "Transaction cancelled"
        );
        assert_eq!(
            describe_claim_error("connection reset"),
            "Network error. Please try again."
        );
        assert_eq!(describe_claim_error("???"), DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn test_format_token_amount() {
        assert_eq!(format_token_amount(0), "0");
        assert_eq!(format_token_amount(10 * 10u128.pow(18)), "10");
        assert_eq!(format_token_amount(15 * 10u128.pow(17)), "1.5");
        assert_eq!(format_token_amount(1), "0.000000000000000001");
    }

    #[test]
    fn test_eligibility_threshold() {
        let joined = Utc::now();

        assert!(is_eligible_session(joined, joined + Duration::seconds(120), 120));
        assert!(!is_eligible_session(joined, joined + Duration::seconds(119), 120));
    }
}
