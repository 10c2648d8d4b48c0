//! Access tokens for the streaming engine, in the engine's "04" format.
//!
//! A token is `"04"` followed by the base64 of:
//! expire (i64 BE) | nonce length (u16 BE) | nonce | ciphertext length (u16 BE) | ciphertext | mode
//!
//! The ciphertext is the JSON [TokenInfo], sealed with AES-256-GCM under the server secret.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

const VERSION: &str = "04";
const NONCE_LENGTH: usize = 12;
const SECRET_LENGTH: usize = 32;
/// Marks the ciphertext as AES-GCM
const GCM_MODE: u8 = 1;

/// Engine app credentials, read from the environment
#[derive(Debug, Clone)]
pub struct EngineCredentials {
    pub app_id: u32,
    pub server_secret: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Zego configuration missing")]
    NotConfigured,
    #[error("appID invalid")]
    AppIdInvalid,
    #[error("userId invalid")]
    UserIdInvalid,
    #[error("secret must be a 32 byte string")]
    SecretInvalid,
    #[error("effectiveTimeInSeconds invalid")]
    EffectiveTimeInvalid,
    #[error("token encryption failed")]
    Encryption,
}

impl TokenError {
    /// The engine's numeric code for an input error
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::AppIdInvalid => Some(1),
            Self::UserIdInvalid => Some(3),
            Self::SecretInvalid => Some(5),
            Self::EffectiveTimeInvalid => Some(6),
            Self::NotConfigured | Self::Encryption => None,
        }
    }
}

/// The plaintext sealed inside a token
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub app_id: u32,
    pub user_id: String,
    pub nonce: i32,
    pub ctime: i64,
    pub expire: i64,
    pub payload: String,
}

/// Mints engine tokens that allow logging in and publishing in one room
pub struct TokenMinter {
    credentials: Option<EngineCredentials>,
    effective_time_in_seconds: i64,
}

impl TokenMinter {
    pub fn new(credentials: Option<EngineCredentials>, effective_time_in_seconds: i64) -> Self {
        Self {
            credentials,
            effective_time_in_seconds,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Mints a token for a user in a room
    pub fn mint(&self, user_id: &str, room_id: &str) -> Result<String, TokenError> {
        let credentials = self.credentials.as_ref().ok_or(TokenError::NotConfigured)?;

        let payload = json!({
            "room_id": room_id,
            // Log in and publish
            "privilege": { "1": 1, "2": 1 },
            "stream_id_list": null,
        });

        debug!("Minting token for {} in room {}", user_id, room_id);

        generate_token04(
            credentials,
            user_id,
            self.effective_time_in_seconds,
            &payload.to_string(),
        )
        .map_err(|e| {
            error!("Could not mint token for {}: {}", user_id, e);
            e
        })
    }
}

pub fn generate_token04(
    credentials: &EngineCredentials,
    user_id: &str,
    effective_time_in_seconds: i64,
    payload: &str,
) -> Result<String, TokenError> {
    if credentials.app_id == 0 {
        return Err(TokenError::AppIdInvalid);
    }

    if user_id.is_empty() {
        return Err(TokenError::UserIdInvalid);
    }

    if credentials.server_secret.len() != SECRET_LENGTH {
        return Err(TokenError::SecretInvalid);
    }

    if effective_time_in_seconds <= 0 {
        return Err(TokenError::EffectiveTimeInvalid);
    }

    let ctime = Utc::now().timestamp();

    let info = TokenInfo {
        app_id: credentials.app_id,
        user_id: user_id.to_string(),
        nonce: rand::random(),
        ctime,
        expire: ctime + effective_time_in_seconds,
        payload: payload.to_string(),
    };

    let plaintext = serde_json::to_vec(&info).map_err(|_| TokenError::Encryption)?;

    let cipher = Aes256Gcm::new_from_slice(credentials.server_secret.as_bytes())
        .map_err(|_| TokenError::SecretInvalid)?;

    let nonce: [u8; NONCE_LENGTH] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| TokenError::Encryption)?;

    let mut binary = Vec::with_capacity(8 + 2 + NONCE_LENGTH + 2 + ciphertext.len() + 1);
    binary.extend_from_slice(&info.expire.to_be_bytes());
    binary.extend_from_slice(&(NONCE_LENGTH as u16).to_be_bytes());
    binary.extend_from_slice(&nonce);
    binary.extend_from_slice(&(ciphertext.len() as u16).to_be_bytes());
    binary.extend_from_slice(&ciphertext);
    binary.push(GCM_MODE);

    Ok(format!("{}{}", VERSION, STANDARD.encode(binary)))
}
