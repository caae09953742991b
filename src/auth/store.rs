use base64::Engine;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use super::storage::CredentialStore;
use crate::api::{ApiClient, ApiError, Credentials, RegisterRequest, RegisterResponse, UserProfile};

/// The authenticated principal: bearer token plus cached profile.
///
/// Invariant: a present principal had a non-expired token at the last check.
#[derive(Debug, Clone)]
pub struct Principal {
    pub token: String,
    pub profile: UserProfile,
}

/// Process-wide auth session.
///
/// Owns the principal lifecycle: populated on login or a valid-token
/// restore at startup, cleared on logout or refresh failure. Views gate on
/// [`is_authenticated`](Self::is_authenticated).
pub struct AuthSession {
    api: Arc<ApiClient>,
    credentials: Arc<CredentialStore>,
    principal: RwLock<Option<Principal>>,
}

impl AuthSession {
    pub fn new(api: Arc<ApiClient>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            api,
            credentials,
            principal: RwLock::new(None),
        }
    }

    /// Restore the session from persisted state at process start.
    ///
    /// The token's embedded expiry is checked locally, no network round
    /// trip. An expired or unparsable token is discarded together with the
    /// cached profile.
    pub fn restore(&self) {
        let Some(token) = self.credentials.access_token() else {
            return;
        };

        if !token_is_current(&token) {
            info!("Stored token expired or unreadable, clearing session");
            if let Err(e) = self.credentials.clear() {
                warn!("Failed to clear stored session: {:#}", e);
            }
            return;
        }

        let profile = self
            .credentials
            .user_data()
            .and_then(|raw| serde_json::from_str::<UserProfile>(&raw).ok());

        if let Some(profile) = profile {
            info!("Restored session for {}", profile.username);
            self.set_principal(Some(Principal { token, profile }));
        }
    }

    /// Authenticate and persist the session
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, ApiError> {
        let response = self.api.login(credentials).await?;

        if let Err(e) = self.credentials.set_access_token(&response.access_token) {
            warn!("Failed to persist access token: {:#}", e);
        }
        match serde_json::to_string(&response.user_info) {
            Ok(raw) => {
                if let Err(e) = self.credentials.set_user_data(&raw) {
                    warn!("Failed to persist profile: {:#}", e);
                }
            }
            Err(e) => warn!("Failed to serialize profile: {}", e),
        }

        info!("Logged in as {}", response.user_info.username);

        self.set_principal(Some(Principal {
            token: response.access_token,
            profile: response.user_info.clone(),
        }));

        Ok(response.user_info)
    }

    /// Create an account. Does not log the new user in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        self.api.register(request).await
    }

    /// End the session. The remote call is best-effort; local state is
    /// cleared no matter what.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("Remote logout failed: {}", e);
        }

        if let Err(e) = self.credentials.clear() {
            warn!("Failed to clear stored session: {:#}", e);
        }
        self.set_principal(None);

        info!("Logged out");
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.principal
            .read()
            .ok()?
            .as_ref()
            .map(|p| p.profile.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal
            .read()
            .map(|p| p.is_some())
            .unwrap_or(false)
    }

    fn set_principal(&self, principal: Option<Principal>) {
        if let Ok(mut guard) = self.principal.write() {
            *guard = principal;
        }
    }
}

/// Check a JWT's embedded `exp` claim against the current time.
///
/// Anything that fails to decode counts as expired; the caller discards it.
fn token_is_current(token: &str) -> bool {
    let Some(exp) = token_expiry(token) else {
        return false;
    };
    exp > chrono::Utc::now().timestamp()
}

fn token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}
