use std::{env, sync::Arc};

use async_trait::async_trait;
use log::{error, info, warn};
use onair_core::{
    describe_claim_error, format_token_amount, CLAIM_SELECTOR, DAILY_CLAIM_CONTRACT,
    INELIGIBLE_MESSAGE,
};
use thiserror::Error;

use crate::{ApiError, ClaimStub, RoomApi};

/// The user's wallet, and through it the claim contract
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn connect(&self) -> Result<(), String>;
    /// Reads how many raw token units one claim pays out
    async fn claim_amount(&self, contract: &str) -> Result<u128, String>;
    /// Sends a transaction, returning its hash
    async fn send_transaction(&self, to: &str, data: &str) -> Result<String, String>;
    async fn wait_for_receipt(&self, hash: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClaimError {
    #[error("{}", INELIGIBLE_MESSAGE)]
    Ineligible,
    #[error("Failed to connect wallet. Please try again.")]
    WalletConnection,
    /// A wallet or contract failure, displayed as something a user can read
    #[error("{}", describe_claim_error(.0))]
    Transaction(String),
    #[error("Could not check eligibility: {0}")]
    Eligibility(#[from] ApiError),
}

/// Where a claim transaction is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    None,
    Pending,
    Confirming,
    Confirmed,
}

/// What the claim button shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimButton {
    pub text: &'static str,
    pub disabled: bool,
}

/// The result of pressing the claim button
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimProgress {
    /// The wallet was connected, the user has to press claim again
    WalletConnected,
    Claimed { amount: String },
}

impl ClaimProgress {
    /// The toast shown for this progress, if any
    pub fn message(&self) -> Option<String> {
        match self {
            Self::WalletConnected => None,
            Self::Claimed { amount } => Some(format!(
                "✅ You claimed your daily {} $STREAM reward!",
                amount
            )),
        }
    }
}

/// Claims the daily reward for one user
pub struct ClaimFlow {
    api: Arc<dyn RoomApi>,
    wallet: Arc<dyn Wallet>,
    user_id: String,
    contract: String,

    loading: bool,
    eligible: bool,
    wallet_connected: bool,
    transaction: TransactionState,
}

impl ClaimFlow {
    pub fn new(api: Arc<dyn RoomApi>, wallet: Arc<dyn Wallet>, user_id: impl Into<String>) -> Self {
        Self {
            api,
            wallet,
            user_id: user_id.into(),
            contract: env::var("DAILY_CLAIM_CONTRACT")
                .unwrap_or_else(|_| DAILY_CLAIM_CONTRACT.to_string()),
            loading: false,
            eligible: false,
            wallet_connected: false,
            transaction: TransactionState::None,
        }
    }

    /// Sends claims to another deployment of the claim contract
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = contract.into();
        self
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }

    pub fn transaction(&self) -> TransactionState {
        self.transaction
    }

    /// Asks the server whether the user has a qualifying session.
    /// A failed check leaves the user ineligible.
    pub async fn refresh_eligibility(&mut self) -> Result<bool, ClaimError> {
        self.loading = true;
        let stats = self.api.streaming_stats(&self.user_id).await;
        self.loading = false;

        self.wallet_connected = self.wallet.is_connected().await;

        match stats {
            Ok(stats) => {
                self.eligible = stats.eligible;
                Ok(stats.eligible)
            }
            Err(e) => {
                warn!("Could not fetch eligibility of {}: {}", self.user_id, e);
                self.eligible = false;
                Err(e.into())
            }
        }
    }

    /// Runs one press of the claim button
    pub async fn claim(&mut self) -> Result<ClaimProgress, ClaimError> {
        if !self.eligible {
            return Err(ClaimError::Ineligible);
        }

        if !self.wallet.is_connected().await {
            self.wallet.connect().await.map_err(|e| {
                error!("Could not connect wallet: {}", e);
                ClaimError::WalletConnection
            })?;

            self.wallet_connected = true;
            return Ok(ClaimProgress::WalletConnected);
        }

        self.wallet_connected = true;

        let amount = self
            .wallet
            .claim_amount(&self.contract)
            .await
            .map(format_token_amount)
            .unwrap_or_else(|e| {
                warn!("Could not read claim amount: {}", e);
                "0".to_string()
            });

        self.transaction = TransactionState::Pending;

        let hash = match self.wallet.send_transaction(&self.contract, CLAIM_SELECTOR).await {
            Ok(hash) => hash,
            Err(e) => return Err(self.fail(e)),
        };

        self.transaction = TransactionState::Confirming;

        if let Err(e) = self.wallet.wait_for_receipt(&hash).await {
            return Err(self.fail(e));
        }

        self.transaction = TransactionState::Confirmed;
        info!("{} claimed {} in {}", self.user_id, amount, hash);

        if let Err(e) = self.refresh_eligibility().await {
            warn!("Could not refresh eligibility after claiming: {}", e);
        }

        Ok(ClaimProgress::Claimed { amount })
    }

    /// Asks the server to settle the claim instead of the wallet
    pub async fn request_from_server(&self) -> Result<ClaimStub, ClaimError> {
        Ok(self.api.request_claim(&self.user_id).await?)
    }

    pub fn button(&self) -> ClaimButton {
        let (text, disabled) = match self.transaction {
            _ if self.loading || !self.eligible => ("Claim", true),
            _ if !self.wallet_connected => ("Claim", false),
            TransactionState::Pending | TransactionState::Confirming => ("Claiming...", true),
            TransactionState::Confirmed => ("Claimed!", true),
            TransactionState::None => ("Claim", false),
        };

        ClaimButton { text, disabled }
    }

    fn fail(&mut self, raw: String) -> ClaimError {
        error!("Claim transaction failed: {}", raw);

        self.transaction = TransactionState::None;
        ClaimError::Transaction(raw)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use super::*;
    use crate::test_util::FakeApi;

    #[derive(Default)]
    struct FakeWallet {
        connected: AtomicBool,
        revert: Option<String>,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Wallet for FakeWallet {
        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn connect(&self) -> Result<(), String> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn claim_amount(&self, _: &str) -> Result<u128, String> {
            Ok(10 * 10u128.pow(18))
        }

        async fn send_transaction(&self, to: &str, data: &str) -> Result<String, String> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), data.to_string()));

            Ok("0xabc".to_string())
        }

        async fn wait_for_receipt(&self, _: &str) -> Result<(), String> {
            match &self.revert {
                Some(reason) => Err(reason.clone()),
                None => Ok(()),
            }
        }
    }

    fn flow(api: &Arc<FakeApi>, wallet: &Arc<FakeWallet>) -> ClaimFlow {
        ClaimFlow::new(api.clone(), wallet.clone(), "fid_42")
    }

    #[tokio::test]
    async fn test_ineligible_users_cannot_claim() {
        let api = Arc::new(FakeApi::default());
        let wallet = Arc::new(FakeWallet::default());
        let mut flow = flow(&api, &wallet);

        assert_eq!(flow.refresh_eligibility().await, Ok(false));
        assert_eq!(flow.button(), ClaimButton { text: "Claim", disabled: true });

        let error = flow.claim().await.unwrap_err();
        assert_eq!(error, ClaimError::Ineligible);
        assert_eq!(error.to_string(), INELIGIBLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_connect_then_claim() {
        let api = Arc::new(FakeApi::default());
        let wallet = Arc::new(FakeWallet::default());
        api.set_eligible(true);

        let mut flow = flow(&api, &wallet);
        flow.refresh_eligibility().await.unwrap();

        // Not connected yet, but the button still invites a press
        assert_eq!(flow.button(), ClaimButton { text: "Claim", disabled: false });

        assert_eq!(flow.claim().await, Ok(ClaimProgress::WalletConnected));
        assert!(wallet.sent.lock().unwrap().is_empty());

        let progress = flow.claim().await.unwrap();
        assert_eq!(
            progress,
            ClaimProgress::Claimed {
                amount: "10".to_string()
            }
        );
        assert_eq!(
            progress.message().as_deref(),
            Some("✅ You claimed your daily 10 $STREAM reward!")
        );
        assert_eq!(
            wallet.sent.lock().unwrap().clone(),
            vec![(DAILY_CLAIM_CONTRACT.to_string(), CLAIM_SELECTOR.to_string())]
        );
        assert_eq!(flow.button(), ClaimButton { text: "Claimed!", disabled: true });
    }

    #[tokio::test]
    async fn test_reverts_are_described() {
        let api = Arc::new(FakeApi::default());
        let wallet = Arc::new(FakeWallet {
            connected: AtomicBool::new(true),
            revert: Some("execution reverted: DailyClaim: claim too soon".to_string()),
            ..Default::default()
        });
        api.set_eligible(true);

        let mut flow = flow(&api, &wallet);
        flow.refresh_eligibility().await.unwrap();

        let error = flow.claim().await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "You've already claimed today. Come back tomorrow!"
        );
        assert_eq!(flow.transaction(), TransactionState::None);
        assert_eq!(flow.button(), ClaimButton { text: "Claim", disabled: false });
    }

    #[tokio::test]
    async fn test_server_stub() {
        let api = Arc::new(FakeApi::default());
        let wallet = Arc::new(FakeWallet::default());

        let stub = flow(&api, &wallet).request_from_server().await.unwrap();
        assert!(!stub.success);
        assert_eq!(stub.error.as_deref(), Some("NOT_IMPLEMENTED"));
    }
}
