// Password auth endpoints
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ApiError, BackendClient, Result};
use crate::retry::with_retry;

/// Token grant returned by sign-in, refresh and auto-confirmed sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Sign-up either logs the user in straight away or waits for email confirmation
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(AuthSession),
    PendingConfirmation(AuthUser),
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a serde_json::Value,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct IdTokenGrant<'a> {
    provider: &'a str,
    id_token: &'a str,
}

#[derive(Serialize)]
struct PasswordUpdate<'a> {
    password: &'a str,
}

impl BackendClient {
    /// Email + password sign-in. Stores the access token for later calls.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let url = self.endpoint("auth/v1/token?grant_type=password");
        debug!("Signing in {}", email);

        // Credentials are never retried; a wrong password stays wrong
        let response = self
            .request(Method::POST, &url)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let response = Self::check(response, "sign in").await?;
        let session: AuthSession = response.json().await?;

        self.set_session_token(Some(session.access_token.clone()));
        info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    /// Sign in with an ID token issued by an external identity provider (e.g. Google)
    pub async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> Result<AuthSession> {
        let url = self.endpoint("auth/v1/token?grant_type=id_token");
        debug!("Signing in with {} ID token", provider);

        let response = self
            .request(Method::POST, &url)
            .json(&IdTokenGrant { provider, id_token })
            .send()
            .await?;
        let response = Self::check(response, "sign in with id token").await?;
        let session: AuthSession = response.json().await?;

        self.set_session_token(Some(session.access_token.clone()));
        info!("Signed in as {} via {}", session.user.id, provider);
        Ok(session)
    }

    /// Register a new account; `metadata` lands in the user's metadata blob
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &serde_json::Value,
    ) -> Result<SignUpResponse> {
        let url = self.endpoint("auth/v1/signup");

        let response = self
            .request(Method::POST, &url)
            .json(&SignUpBody {
                email,
                password,
                data: metadata,
            })
            .send()
            .await?;
        let response = Self::check(response, "sign up").await?;
        let body: SignUpResponse = response.json().await?;

        if let SignUpResponse::Session(session) = &body {
            self.set_session_token(Some(session.access_token.clone()));
        }
        Ok(body)
    }

    /// Exchange a refresh token for a fresh session
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let url = self.endpoint("auth/v1/token?grant_type=refresh_token");

        let session: AuthSession = with_retry(&self.retry_config, || async {
            let response = self
                .request(Method::POST, &url)
                .json(&RefreshGrant { refresh_token })
                .send()
                .await?;
            let response = Self::check(response, "refresh session").await?;
            Ok(response.json().await?)
        })
        .await?;

        self.set_session_token(Some(session.access_token.clone()));
        Ok(session)
    }

    /// Look up the user behind the current token
    pub async fn get_user(&self) -> Result<AuthUser> {
        let url = self.endpoint("auth/v1/user");

        with_retry(&self.retry_config, || async {
            let response = self.request(Method::GET, &url).send().await?;
            let response = Self::check(response, "get user").await?;
            Ok(response.json().await?)
        })
        .await
    }

    /// Set a new password for the signed-in user
    pub async fn update_password(&self, password: &str) -> Result<AuthUser> {
        let url = self.endpoint("auth/v1/user");
        if self.session_token().is_none() {
            return Err(ApiError::AuthRequired("no session to update".into()));
        }

        let response = self
            .request(Method::PUT, &url)
            .json(&PasswordUpdate { password })
            .send()
            .await?;
        let response = Self::check(response, "update password").await?;
        Ok(response.json().await?)
    }

    /// Revoke the current session. The local token is dropped either way.
    pub async fn sign_out(&self) -> Result<()> {
        let url = self.endpoint("auth/v1/logout");
        let result = match self.session_token() {
            Some(_) => match self.request(Method::POST, &url).send().await {
                Ok(response) => Self::check(response, "sign out").await.map(|_| ()),
                Err(e) => Err(e.into()),
            },
            None => Ok(()),
        };

        self.set_session_token(None);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_with_session() {
        let body = r#"{
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": {"id": "u-1", "email": "ana@example.com", "user_metadata": {"name": "Ana"}}
        }"#;

        match serde_json::from_str::<SignUpResponse>(body).unwrap() {
            SignUpResponse::Session(session) => {
                assert_eq!(session.access_token, "jwt");
                assert_eq!(session.user.id, "u-1");
                assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
            }
            other => panic!("expected session, got {:?}", other),
        }
    }

    #[test]
    fn test_grant_bodies() {
        let id_token = serde_json::to_value(IdTokenGrant {
            provider: "google",
            id_token: "eyJhbGciOi",
        })
        .unwrap();
        assert_eq!(id_token, serde_json::json!({"provider": "google", "id_token": "eyJhbGciOi"}));

        let update = serde_json::to_value(PasswordUpdate { password: "n3w-pass" }).unwrap();
        assert_eq!(update, serde_json::json!({"password": "n3w-pass"}));
    }

    #[tokio::test]
    async fn test_update_password_needs_a_session() {
        let client = BackendClient::new("http://127.0.0.1:9", "anon").unwrap();
        let err = client.update_password("n3w-pass").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthRequired(_)));
    }

    #[test]
    fn test_sign_up_pending_confirmation() {
        let body = r#"{"id": "u-2", "email": "bia@example.com", "confirmation_sent_at": "2024-01-01T00:00:00Z"}"#;

        match serde_json::from_str::<SignUpResponse>(body).unwrap() {
            SignUpResponse::PendingConfirmation(user) => {
                assert_eq!(user.id, "u-2");
                assert_eq!(user.email.as_deref(), Some("bia@example.com"));
            }
            other => panic!("expected pending confirmation, got {:?}", other),
        }
    }
}
