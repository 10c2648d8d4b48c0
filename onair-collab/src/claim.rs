use log::info;

/// What the claim endpoint answers until claims are settled server side
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

/// Server side claims. Rewards are currently claimed by the user's wallet directly
/// against the claim contract, so this only acknowledges the request.
pub struct Claims;

impl Claims {
    pub fn request(&self, user_id: &str) -> ClaimOutcome {
        info!("Claim requested by {}", user_id);

        ClaimOutcome {
            success: false,
            message: "Claim functionality will be implemented with wallet integration".to_string(),
            error: Some("NOT_IMPLEMENTED".to_string()),
        }
    }
}
