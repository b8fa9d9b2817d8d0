//! Session tokens and sign-in links
//!
//! Both are HS256 JWTs signed with `JWT_SECRET`. A `purpose` claim keeps a sign-in
//! link from being replayed as a session token and vice versa.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use logoscope_core::{normalize_email, Account, AppError, Config, CreationChannel, Requester};
use logoscope_db::AccountStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::notify::{Notification, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    SignIn,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid, // account_id
    pub purpose: TokenPurpose,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    sign_in_ttl: Duration,
    frontend_url: String,
}

impl TokenService {
    pub fn new(secret: &str, session_ttl: Duration, sign_in_ttl: Duration, frontend_url: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
            sign_in_ttl,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret(),
            Duration::hours(config.session_expiry_hours()),
            Duration::minutes(config.sign_in_link_expiry_minutes()),
            config.frontend_url(),
        )
    }

    pub fn issue(&self, account_id: Uuid, purpose: TokenPurpose) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let ttl = match purpose {
            TokenPurpose::Session => self.session_ttl,
            TokenPurpose::SignIn => self.sign_in_ttl,
        };
        let expires_at = now + ttl;
        let claims = TokenClaims {
            sub: account_id,
            purpose,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<TokenClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("Token validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        if data.claims.purpose != purpose {
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }
        Ok(data.claims)
    }

    /// Frontend URL that exchanges a sign-in token for a session.
    pub fn sign_in_link(&self, account_id: Uuid) -> Result<String, AppError> {
        let (token, _) = self.issue(account_id, TokenPurpose::SignIn)?;
        Ok(format!("{}/auth/verify?token={}", self.frontend_url, token))
    }
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub account: Account,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    tokens: Arc<TokenService>,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<TokenService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            accounts,
            tokens,
            notifier,
        }
    }

    /// Find or create the account for `email` and mail it a sign-in link.
    #[tracing::instrument(skip(self, email, display_name))]
    pub async fn request_sign_in(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<(), AppError> {
        let email = normalize_email(email);
        email
            .parse::<lettre::Address>()
            .map_err(|_| AppError::Validation("email is not a valid address".to_string()))?;

        let resolved = self
            .accounts
            .find_or_create(&email, display_name, CreationChannel::Direct)
            .await?;
        let link = self.tokens.sign_in_link(resolved.account.id)?;

        self.notifier
            .send(&Notification::SignInLink {
                email: resolved.account.email.clone(),
                link,
            })
            .await?;

        tracing::info!(
            account_id = %resolved.account.id,
            new_account = resolved.created,
            "Sign-in link sent"
        );
        Ok(())
    }

    /// Exchange a sign-in link token for a session token.
    pub async fn complete_sign_in(&self, token: &str) -> Result<SessionGrant, AppError> {
        let claims = self.tokens.verify(token, TokenPurpose::SignIn)?;
        let account = self
            .accounts
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        let (session_token, expires_at) = self.tokens.issue(account.id, TokenPurpose::Session)?;
        Ok(SessionGrant {
            session_token,
            expires_at,
            account,
        })
    }

    /// Resolve a bearer session token to the calling account.
    pub async fn authenticate(&self, session_token: &str) -> Result<Requester, AppError> {
        let claims = self.tokens.verify(session_token, TokenPurpose::Session)?;
        let account = self
            .accounts
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        Ok(Requester {
            account_id: account.id,
            is_admin: account.is_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingNotifier;
    use logoscope_db::test_helpers::InMemoryStore;

    const SECRET: &str = "test-secret-key-min-32-characters-long";

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(
            SECRET,
            Duration::hours(1),
            Duration::minutes(30),
            "https://logoscope.test/",
        ))
    }

    #[test]
    fn test_purpose_is_enforced() {
        let tokens = tokens();
        let id = Uuid::new_v4();
        let (sign_in, _) = tokens.issue(id, TokenPurpose::SignIn).unwrap();

        assert_eq!(tokens.verify(&sign_in, TokenPurpose::SignIn).unwrap().sub, id);
        assert!(matches!(
            tokens.verify(&sign_in, TokenPurpose::Session),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = TokenService::new(
            SECRET,
            Duration::seconds(-120),
            Duration::minutes(30),
            "https://logoscope.test",
        );
        let (session, _) = tokens.issue(Uuid::new_v4(), TokenPurpose::Session).unwrap();
        assert!(tokens.verify(&session, TokenPurpose::Session).is_err());
    }

    #[test]
    fn test_sign_in_link_points_at_frontend() {
        let link = tokens().sign_in_link(Uuid::new_v4()).unwrap();
        assert!(link.starts_with("https://logoscope.test/auth/verify?token="));
    }

    #[tokio::test]
    async fn test_sign_in_round_trip() {
        let store = InMemoryStore::new();
        let notifier = RecordingNotifier::new();
        let service = AuthService::new(Arc::new(store.clone()), tokens(), Arc::new(notifier.clone()));

        service
            .request_sign_in("New.User@Example.com", Some("New User"))
            .await
            .unwrap();
        assert_eq!(store.account_count(), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        let Notification::SignInLink { email, link } = &sent[0] else {
            panic!("expected sign-in link");
        };
        assert_eq!(email, "new.user@example.com");
        let token = link.split("token=").nth(1).unwrap();

        let grant = service.complete_sign_in(token).await.unwrap();
        let requester = service.authenticate(&grant.session_token).await.unwrap();
        assert_eq!(requester.account_id, grant.account.id);
        assert!(!requester.is_admin);

        assert!(service.authenticate(token).await.is_err());
    }

    #[tokio::test]
    async fn test_sign_in_rejects_invalid_email() {
        let store = InMemoryStore::new();
        let service = AuthService::new(
            Arc::new(store.clone()),
            tokens(),
            Arc::new(RecordingNotifier::new()),
        );
        assert!(matches!(
            service.request_sign_in("nope", None).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(store.account_count(), 0);
    }
}
