// Who is signed in, injected wherever a component needs it
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::{
    backend::{AuthBackend, AuthGrant, ProfileStore, SignUpResult},
    models::{Identity, ProfileRecord, Role},
    session_store::SessionStore,
    Error, Result,
};

/// Minimum password length the auth service accepts
pub const MIN_PASSWORD_LEN: usize = 6;

/// Tokens treated as expired this long before their real expiry
const EXPIRY_LEEWAY_SECS: i64 = 60;

const GOOGLE_PROVIDER: &str = "google";

/// A signed-in session and the side of the marketplace it was opened for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub grant: AuthGrant,
    pub role: Role,
}

impl Session {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.grant.user_id.clone(),
            email: self.grant.email.clone(),
            role: self.role,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.grant
            .expires_at
            .is_some_and(|at| at - Duration::seconds(EXPIRY_LEEWAY_SECS) <= now)
    }
}

/// Registration form contents
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: Option<String>,
    pub role: Role,
    pub accepted_terms: bool,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty() {
            return Err(Error::InvalidInput("Please fill in every field".into()));
        }
        if !self.email.contains('@') {
            return Err(Error::InvalidInput(format!("'{}' is not an email address", self.email.trim())));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "Passwords need at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.password != self.confirm_password {
            return Err(Error::InvalidInput("Passwords do not match".into()));
        }
        if !self.accepted_terms {
            return Err(Error::InvalidInput("You need to accept the terms of use".into()));
        }
        Ok(())
    }
}

/// Settings form for a new password
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<()> {
        if self.current_password.is_empty() {
            return Err(Error::InvalidInput("Please enter your current password".into()));
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "The new password needs at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.new_password != self.confirm_password {
            return Err(Error::InvalidInput("Passwords do not match".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Identity),
    /// Check your inbox; sign in after confirming
    ConfirmationRequired,
}

/// The auth context: current session plus the operations that change it
pub struct AuthContext {
    auth: Arc<dyn AuthBackend>,
    profiles: Arc<dyn ProfileStore>,
    store: Option<SessionStore>,
    session: RwLock<Option<Session>>,
}

impl AuthContext {
    pub fn new(auth: Arc<dyn AuthBackend>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            auth,
            profiles,
            store: None,
            session: RwLock::new(None),
        }
    }

    /// Enable "remember me" persistence
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().as_ref().map(Session::identity)
    }

    pub fn role(&self) -> Option<Role> {
        self.read().as_ref().map(|s| s.role)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.grant.access_token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_some()
    }

    /// The current identity, or a precondition error for signed-out callers
    pub fn require_identity(&self) -> Result<Identity> {
        self.identity()
            .ok_or_else(|| Error::PreconditionError("You need to be signed in".into()))
    }

    /// Password sign-in for the given role
    pub async fn sign_in(&self, email: &str, password: &str, role: Role, remember: bool) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput("Please fill in every field".into()));
        }

        let grant = self.auth.sign_in(email, password).await?;
        self.establish(grant, role, remember).await
    }

    /// Sign in with a Google ID token obtained by the caller
    pub async fn sign_in_with_google(&self, id_token: &str, role: Role, remember: bool) -> Result<Identity> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(Error::InvalidInput("Missing Google ID token".into()));
        }

        let grant = self.auth.sign_in_with_id_token(GOOGLE_PROVIDER, id_token).await?;
        self.establish(grant, role, remember).await
    }

    /// Change the signed-in user's password
    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        let identity = self.require_identity()?;
        change.validate()?;

        self.auth.update_password(&change.new_password).await?;
        info!("Password changed for {}", identity.email);
        Ok(())
    }

    /// Adopt a fresh grant; any failure from here on drops its token again
    async fn establish(&self, grant: AuthGrant, role: Role, remember: bool) -> Result<Identity> {
        let session = Session { grant, role };
        let identity = session.identity();

        let adopted = async {
            self.ensure_profile(&identity).await?;
            self.remember(&session, remember)
        }
        .await;
        if let Err(e) = adopted {
            self.auth.use_access_token(None);
            return Err(e);
        }

        self.set(Some(session));
        info!("Signed in as {} ({})", identity.email, role);
        Ok(identity)
    }

    /// The first sign-in after an emailed confirmation has no profile row yet,
    /// so one is created from the account email.
    async fn ensure_profile(&self, identity: &Identity) -> Result<()> {
        match self.profiles.fetch_profile(identity).await {
            Ok(_) => Ok(()),
            Err(Error::NotFound(_)) => {
                info!("No {} profile for {} yet, creating one", identity.role, identity.user_id);
                self.profiles
                    .create_profile(identity.role, &starter_profile(identity, None, None))
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Register an account and, when the service signs it in right away, its profile row
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome> {
        request.validate()?;

        let email = request.email.trim();
        let display_name = request.display_name.trim();
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        match self
            .auth
            .sign_up(email, &request.password, display_name, phone.clone())
            .await?
        {
            SignUpResult::SignedIn(grant) => {
                let session = Session {
                    grant,
                    role: request.role,
                };
                let identity = session.identity();
                let profile = starter_profile(&identity, Some(display_name), phone);
                if let Err(e) = self.profiles.create_profile(request.role, &profile).await {
                    self.auth.use_access_token(None);
                    return Err(e);
                }

                self.set(Some(session));
                info!("Registered and signed in as {}", identity.email);
                Ok(SignUpOutcome::SignedIn(identity))
            }
            SignUpResult::ConfirmationRequired { user_id } => {
                info!("Registered {}; waiting for email confirmation", user_id);
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    /// Sign out locally even when the remote call fails
    pub async fn sign_out(&self) -> Result<()> {
        let remote = self.auth.sign_out().await;
        self.auth.use_access_token(None);
        self.set(None);

        if let Some(store) = &self.store {
            store.clear()?;
        }

        if let Err(e) = &remote {
            warn!("Remote sign-out failed: {}", e);
        }
        remote
    }

    /// Pick up a remembered session
    ///
    /// An expired access token is refreshed. A live one is checked with the
    /// backend first; when that check cannot reach the backend the saved
    /// session is used as is.
    pub async fn restore(&self) -> Result<Option<Identity>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(session) = store.load()? else {
            debug!("No saved session");
            return Ok(None);
        };

        let session = if session.is_expired(Utc::now()) {
            self.renew(store, session).await?
        } else {
            self.verify(store, session).await?
        };
        let Some(session) = session else {
            return Ok(None);
        };

        self.auth.use_access_token(Some(session.grant.access_token.clone()));
        let identity = session.identity();
        self.set(Some(session));
        debug!("Restored session for {}", identity.email);
        Ok(Some(identity))
    }

    async fn verify(&self, store: &SessionStore, session: Session) -> Result<Option<Session>> {
        self.auth.use_access_token(Some(session.grant.access_token.clone()));

        match self.auth.current_user_id().await {
            Ok(user_id) if user_id == session.grant.user_id => Ok(Some(session)),
            Ok(user_id) => {
                warn!(
                    "Saved session token belongs to {}, expected {}",
                    user_id, session.grant.user_id
                );
                self.auth.use_access_token(None);
                store.clear()?;
                Ok(None)
            }
            Err(Error::AuthError(e)) => {
                debug!("Saved access token rejected ({}), refreshing", e);
                self.auth.use_access_token(None);
                self.renew(store, session).await
            }
            Err(e) => {
                warn!("Could not verify saved session, using it anyway: {}", e);
                Ok(Some(session))
            }
        }
    }

    async fn renew(&self, store: &SessionStore, mut session: Session) -> Result<Option<Session>> {
        let Some(refresh_token) = session.grant.refresh_token.clone() else {
            store.clear()?;
            return Ok(None);
        };

        match self.auth.refresh(&refresh_token).await {
            Ok(grant) => {
                session.grant = grant;
                store.save(&session)?;
                Ok(Some(session))
            }
            Err(e) => {
                warn!("Saved session could not be refreshed: {}", e);
                store.clear()?;
                Ok(None)
            }
        }
    }

    fn remember(&self, session: &Session, remember: bool) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if remember {
            store.save(session)
        } else {
            store.clear()
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set(&self, session: Option<Session>) {
        let mut guard = self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = session;
    }
}

/// Profile row for a freshly registered account
fn starter_profile(identity: &Identity, display_name: Option<&str>, phone: Option<String>) -> ProfileRecord {
    let display_name = display_name
        .map(str::to_string)
        .unwrap_or_else(|| identity.email.split('@').next().unwrap_or_default().to_string());

    ProfileRecord {
        id: identity.user_id.clone(),
        display_name,
        email: identity.email.clone(),
        phone,
        avatar_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockAuthBackend, MockProfileStore};

    fn grant(expires_at: Option<DateTime<Utc>>) -> AuthGrant {
        AuthGrant {
            access_token: "jwt-1".into(),
            refresh_token: Some("refresh-1".into()),
            user_id: "u-1".into(),
            email: "ana@example.com".into(),
            expires_at,
        }
    }

    fn profile() -> ProfileRecord {
        ProfileRecord {
            id: "u-1".into(),
            display_name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: None,
            avatar_url: None,
        }
    }

    fn request() -> SignUpRequest {
        SignUpRequest {
            display_name: " Mariana Costa ".into(),
            email: "mari@example.com".into(),
            password: "s3cret!".into(),
            confirm_password: "s3cret!".into(),
            phone: Some("  ".into()),
            role: Role::Advertiser,
            accepted_terms: true,
        }
    }

    fn context(auth: MockAuthBackend, profiles: MockProfileStore) -> AuthContext {
        AuthContext::new(Arc::new(auth), Arc::new(profiles))
    }

    #[test]
    fn test_sign_up_validation() {
        assert!(request().validate().is_ok());

        let mismatch = SignUpRequest {
            confirm_password: "other".into(),
            ..request()
        };
        assert!(mismatch.validate().unwrap_err().to_string().contains("do not match"));

        let short = SignUpRequest {
            password: "abc".into(),
            confirm_password: "abc".into(),
            ..request()
        };
        assert!(short.validate().is_err());

        let no_terms = SignUpRequest {
            accepted_terms: false,
            ..request()
        };
        assert!(no_terms.validate().unwrap_err().to_string().contains("terms"));
    }

    #[test]
    fn test_expiry_uses_leeway() {
        let now = Utc::now();
        let session = |at| Session {
            grant: grant(Some(at)),
            role: Role::Renter,
        };

        assert!(session(now + Duration::seconds(30)).is_expired(now));
        assert!(!session(now + Duration::minutes(10)).is_expired(now));
        assert!(!Session {
            grant: grant(None),
            role: Role::Renter
        }
        .is_expired(now));
    }

    #[tokio::test]
    async fn test_sign_in_sets_identity() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in()
            .withf(|email, password| email == "ana@example.com" && password == "pw")
            .times(1)
            .returning(|_, _| Ok(grant(None)));

        let mut profiles = MockProfileStore::new();
        profiles
            .expect_fetch_profile()
            .withf(|owner| owner.role == Role::Renter)
            .times(1)
            .returning(|_| Ok(profile()));
        profiles.expect_create_profile().times(0);

        let ctx = context(auth, profiles);
        let identity = ctx.sign_in(" ana@example.com ", "pw", Role::Renter, false).await.unwrap();

        assert_eq!(identity.user_id, "u-1");
        assert_eq!(ctx.access_token().as_deref(), Some("jwt-1"));
        assert_eq!(ctx.role(), Some(Role::Renter));
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_profile() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().returning(|_, _| Ok(grant(None)));

        let mut profiles = MockProfileStore::new();
        profiles
            .expect_fetch_profile()
            .returning(|_| Err(Error::NotFound("advertisers row u-1".into())));
        profiles
            .expect_create_profile()
            .withf(|role, record| *role == Role::Advertiser && record.display_name == "ana")
            .times(1)
            .returning(|_, record| Ok(record.clone()));

        let ctx = context(auth, profiles);
        ctx.sign_in("ana@example.com", "pw", Role::Advertiser, false).await.unwrap();
        assert!(ctx.is_signed_in());
    }

    #[tokio::test]
    async fn test_blank_credentials_skip_the_backend() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().times(0);

        let ctx = context(auth, MockProfileStore::new());
        let err = ctx.sign_in("", "pw", Role::Renter, false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(ctx.require_identity().is_err());
    }

    #[tokio::test]
    async fn test_remember_me_controls_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().returning(|_, _| Ok(grant(None)));
        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch_profile().returning(|_| Ok(profile()));

        let ctx = context(auth, profiles).with_store(SessionStore::new(&path));

        ctx.sign_in("ana@example.com", "pw", Role::Renter, true).await.unwrap();
        assert!(path.exists());

        ctx.sign_in("ana@example.com", "pw", Role::Renter, false).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_when_signed_in() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_up()
            .withf(|email, _, name, phone| email == "mari@example.com" && name == "Mariana Costa" && phone.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(SignUpResult::SignedIn(grant(None))));

        let mut profiles = MockProfileStore::new();
        profiles
            .expect_create_profile()
            .withf(|role, record| *role == Role::Advertiser && record.display_name == "Mariana Costa")
            .times(1)
            .returning(|_, record| Ok(record.clone()));

        let ctx = context(auth, profiles);
        let outcome = ctx.sign_up(&request()).await.unwrap();

        assert!(matches!(outcome, SignUpOutcome::SignedIn(ref id) if id.role == Role::Advertiser));
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_up()
            .returning(|_, _, _, _| Ok(SignUpResult::ConfirmationRequired { user_id: "u-9".into() }));
        let mut profiles = MockProfileStore::new();
        profiles.expect_create_profile().times(0);

        let ctx = context(auth, profiles);
        assert_eq!(ctx.sign_up(&request()).await.unwrap(), SignUpOutcome::ConfirmationRequired);
        assert!(!ctx.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_on_remote_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().returning(|_, _| Ok(grant(None)));
        auth.expect_sign_out()
            .times(1)
            .returning(|| Err(Error::RemoteError("offline".into())));
        auth.expect_use_access_token().withf(|token| token.is_none()).times(1).return_const(());

        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch_profile().returning(|_| Ok(profile()));

        let ctx = context(auth, profiles).with_store(SessionStore::new(&path));
        ctx.sign_in("ana@example.com", "pw", Role::Renter, true).await.unwrap();

        assert!(ctx.sign_out().await.is_err());
        assert!(!ctx.is_signed_in());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_restore_refreshes_expired_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store
            .save(&Session {
                grant: grant(Some(Utc::now() - Duration::hours(1))),
                role: Role::Advertiser,
            })
            .unwrap();

        let mut auth = MockAuthBackend::new();
        auth.expect_refresh()
            .withf(|token| token == "refresh-1")
            .times(1)
            .returning(|_| {
                Ok(AuthGrant {
                    access_token: "jwt-2".into(),
                    ..grant(Some(Utc::now() + Duration::hours(1)))
                })
            });
        auth.expect_use_access_token()
            .withf(|token| token.as_deref() == Some("jwt-2"))
            .times(1)
            .return_const(());

        let ctx = context(auth, MockProfileStore::new()).with_store(store.clone());
        let identity = ctx.restore().await.unwrap().unwrap();

        assert_eq!(identity.role, Role::Advertiser);
        assert_eq!(ctx.access_token().as_deref(), Some("jwt-2"));
        assert_eq!(store.load().unwrap().unwrap().grant.access_token, "jwt-2");
    }

    #[tokio::test]
    async fn test_restore_drops_unrefreshable_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store
            .save(&Session {
                grant: grant(Some(Utc::now() - Duration::hours(1))),
                role: Role::Renter,
            })
            .unwrap();

        let mut auth = MockAuthBackend::new();
        auth.expect_refresh()
            .returning(|_| Err(Error::AuthError("refresh token revoked".into())));

        let ctx = context(auth, MockProfileStore::new()).with_store(store.clone());
        assert!(ctx.restore().await.unwrap().is_none());
        assert!(store.load().unwrap().is_none());
    }

    fn saved(store: &SessionStore, expires_at: Option<DateTime<Utc>>) {
        store
            .save(&Session {
                grant: grant(expires_at),
                role: Role::Renter,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_profile_creation_drops_token() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().returning(|_, _| Ok(grant(None)));
        auth.expect_use_access_token()
            .withf(|token| token.is_none())
            .times(1)
            .return_const(());

        let mut profiles = MockProfileStore::new();
        profiles
            .expect_fetch_profile()
            .returning(|_| Err(Error::NotFound("profiles row u-1".into())));
        profiles
            .expect_create_profile()
            .returning(|_, _| Err(Error::AuthError("row level security".into())));

        let ctx = context(auth, profiles);
        let err = ctx.sign_in("ana@example.com", "pw", Role::Renter, false).await.unwrap_err();

        assert!(matches!(err, Error::AuthError(_)));
        assert!(!ctx.is_signed_in());
    }

    #[tokio::test]
    async fn test_unwritable_session_file_drops_token() {
        let dir = tempfile::tempdir().unwrap();

        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().returning(|_, _| Ok(grant(None)));
        auth.expect_use_access_token()
            .withf(|token| token.is_none())
            .times(1)
            .return_const(());
        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch_profile().returning(|_| Ok(profile()));

        // The store path is a directory, so saving fails
        let ctx = context(auth, profiles).with_store(SessionStore::new(dir.path()));
        assert!(ctx.sign_in("ana@example.com", "pw", Role::Renter, true).await.is_err());
        assert!(!ctx.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_up_profile_failure_drops_token() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_up()
            .returning(|_, _, _, _| Ok(SignUpResult::SignedIn(grant(None))));
        auth.expect_use_access_token()
            .withf(|token| token.is_none())
            .times(1)
            .return_const(());

        let mut profiles = MockProfileStore::new();
        profiles
            .expect_create_profile()
            .returning(|_, _| Err(Error::RemoteError("duplicate key".into())));

        let ctx = context(auth, profiles);
        assert!(ctx.sign_up(&request()).await.is_err());
        assert!(!ctx.is_signed_in());
    }

    #[tokio::test]
    async fn test_google_sign_in_uses_id_token() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in_with_id_token()
            .withf(|provider, token| provider == "google" && token == "eyJhbGciOi")
            .times(1)
            .returning(|_, _| Ok(grant(None)));

        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch_profile().returning(|_| Ok(profile()));

        let ctx = context(auth, profiles);
        let identity = ctx.sign_in_with_google(" eyJhbGciOi ", Role::Renter, false).await.unwrap();
        assert_eq!(identity.email, "ana@example.com");

        let err = ctx.sign_in_with_google("", Role::Renter, false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_password_change_validation() {
        let change = |current: &str, new: &str, confirm: &str| PasswordChange {
            current_password: current.into(),
            new_password: new.into(),
            confirm_password: confirm.into(),
        };

        assert!(change("old-pass", "n3w-pass", "n3w-pass").validate().is_ok());
        assert!(change("", "n3w-pass", "n3w-pass")
            .validate()
            .unwrap_err()
            .to_string()
            .contains("current password"));
        assert!(change("old-pass", "abc", "abc")
            .validate()
            .unwrap_err()
            .to_string()
            .contains(&MIN_PASSWORD_LEN.to_string()));
        assert!(change("old-pass", "n3w-pass", "n3w-past")
            .validate()
            .unwrap_err()
            .to_string()
            .contains("do not match"));
    }

    #[tokio::test]
    async fn test_change_password() {
        let mut auth = MockAuthBackend::new();
        auth.expect_sign_in().returning(|_, _| Ok(grant(None)));
        auth.expect_update_password()
            .withf(|password| password == "n3w-pass")
            .times(1)
            .returning(|_| Ok(()));
        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch_profile().returning(|_| Ok(profile()));

        let ctx = context(auth, profiles);
        let change = PasswordChange {
            current_password: "pw".into(),
            new_password: "n3w-pass".into(),
            confirm_password: "n3w-pass".into(),
        };

        // Signed out callers never reach the backend
        assert!(matches!(
            ctx.change_password(&change).await,
            Err(Error::PreconditionError(_))
        ));

        ctx.sign_in("ana@example.com", "pw", Role::Renter, false).await.unwrap();
        ctx.change_password(&change).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_checks_live_session_with_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        saved(&store, Some(Utc::now() + Duration::hours(1)));

        let mut auth = MockAuthBackend::new();
        auth.expect_current_user_id().times(1).returning(|| Ok("u-1".into()));
        auth.expect_use_access_token()
            .withf(|token| token.as_deref() == Some("jwt-1"))
            .return_const(());
        auth.expect_refresh().times(0);

        let ctx = context(auth, MockProfileStore::new()).with_store(store);
        let identity = ctx.restore().await.unwrap().unwrap();
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(ctx.access_token().as_deref(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn test_restore_refreshes_revoked_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        saved(&store, None);

        let mut auth = MockAuthBackend::new();
        auth.expect_current_user_id()
            .returning(|| Err(Error::AuthError("JWT expired".into())));
        auth.expect_use_access_token().return_const(());
        auth.expect_refresh().times(1).returning(|_| {
            Ok(AuthGrant {
                access_token: "jwt-2".into(),
                ..grant(None)
            })
        });

        let ctx = context(auth, MockProfileStore::new()).with_store(store.clone());
        assert!(ctx.restore().await.unwrap().is_some());
        assert_eq!(ctx.access_token().as_deref(), Some("jwt-2"));
        assert_eq!(store.load().unwrap().unwrap().grant.access_token, "jwt-2");
    }

    #[tokio::test]
    async fn test_restore_offline_keeps_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        saved(&store, None);

        let mut auth = MockAuthBackend::new();
        auth.expect_current_user_id()
            .returning(|| Err(Error::RemoteError("connection refused".into())));
        auth.expect_use_access_token().return_const(());
        auth.expect_refresh().times(0);

        let ctx = context(auth, MockProfileStore::new()).with_store(store.clone());
        assert!(ctx.restore().await.unwrap().is_some());
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_drops_session_of_another_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        saved(&store, None);

        let mut auth = MockAuthBackend::new();
        auth.expect_current_user_id().returning(|| Ok("u-2".into()));
        auth.expect_use_access_token().return_const(());

        let ctx = context(auth, MockProfileStore::new()).with_store(store.clone());
        assert!(ctx.restore().await.unwrap().is_none());
        assert!(!ctx.is_signed_in());
        assert!(store.load().unwrap().is_none());
    }
}
