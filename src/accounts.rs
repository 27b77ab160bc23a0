//! Registration, email confirmation, password reset and password change.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{
    CredentialError, MatchResult, PasswordEncoder, Principal, hash_blocking, validate_password,
    verify_blocking,
};
use crate::db::{
    AccountState, Database, NewUser, OneTimeTokenError, UserRole, normalize_email,
};
use crate::jwt::{TokenCodec, TokenError, TokenPair};
use crate::mail::{Mailer, confirmation_link, password_reset_link};

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 100;
const DAY_SECS: u64 = 24 * 60 * 60;

/// Last second (UTC) of the day `days` days after `now`.
pub fn end_of_day_after(now: u64, days: u32) -> u64 {
    (now / DAY_SECS + u64::from(days) + 1) * DAY_SECS - 1
}

/// Sign-up form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Result of a successful sign-up.
#[derive(Debug, Clone)]
pub struct Registered {
    pub user_id: i64,
    pub subject_id: String,
    pub email: String,
    pub role: UserRole,
    /// The account already existed unconfirmed and its code was sent again
    pub confirmation_resent: bool,
}

#[derive(Debug)]
pub enum AccountError {
    InvalidInput(String),
    /// A confirmed or banned account already uses this email
    AlreadyExists,
    /// One-time token unknown or already used
    TokenNotFound,
    TokenExpired,
    /// The account behind a confirmation code is banned
    Locked,
    /// The authenticated user no longer exists
    UnknownUser,
    Credential(CredentialError),
    Token(TokenError),
    Database(sqlx::Error),
}

impl From<sqlx::Error> for AccountError {
    fn from(e: sqlx::Error) -> Self {
        AccountError::Database(e)
    }
}

impl From<OneTimeTokenError> for AccountError {
    fn from(e: OneTimeTokenError) -> Self {
        match e {
            OneTimeTokenError::NotFound => AccountError::TokenNotFound,
            OneTimeTokenError::Expired => AccountError::TokenExpired,
            OneTimeTokenError::Database(e) => AccountError::Database(e),
        }
    }
}

impl From<CredentialError> for AccountError {
    fn from(e: CredentialError) -> Self {
        AccountError::Credential(e)
    }
}

impl std::fmt::Display for AccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountError::InvalidInput(msg) => write!(f, "{}", msg),
            AccountError::AlreadyExists => write!(f, "User already exists"),
            AccountError::TokenNotFound => write!(f, "Token not found"),
            AccountError::TokenExpired => write!(f, "Token expired"),
            AccountError::Locked => write!(f, "Account is locked"),
            AccountError::UnknownUser => write!(f, "User not found"),
            AccountError::Credential(e) => write!(f, "{}", e),
            AccountError::Token(e) => write!(f, "{}", e),
            AccountError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for AccountError {}

fn validate_email(email: &str) -> Result<(), AccountError> {
    let valid = email.len() <= MAX_EMAIL_LENGTH
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if valid {
        Ok(())
    } else {
        Err(AccountError::InvalidInput("Invalid email address".into()))
    }
}

fn validate_name(field: &str, value: &str) -> Result<(), AccountError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AccountError::InvalidInput(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(AccountError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AccountService {
    db: Database,
    codec: Arc<TokenCodec>,
    encoder: PasswordEncoder,
    mailer: Arc<dyn Mailer>,
    frontend_url: Url,
    confirmation_expiration_days: u32,
}

impl AccountService {
    pub fn new(
        db: Database,
        codec: Arc<TokenCodec>,
        encoder: PasswordEncoder,
        mailer: Arc<dyn Mailer>,
        frontend_url: Url,
        confirmation_expiration_days: u32,
    ) -> Self {
        Self {
            db,
            codec,
            encoder,
            mailer,
            frontend_url,
            confirmation_expiration_days,
        }
    }

    /// Seconds from `now` until a code issued now expires: the end of the
    /// day `confirmation_expiration_days` out.
    fn confirmation_ttl(&self, now: u64) -> u64 {
        end_of_day_after(now, self.confirmation_expiration_days) - now
    }

    /// Create an unconfirmed account and email its confirmation link.
    ///
    /// Registering again with the email of an unconfirmed account extends and
    /// resends that account's code instead.
    pub async fn register(
        &self,
        registration: Registration,
        now: u64,
    ) -> Result<Registered, AccountError> {
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        validate_name("First name", &registration.first_name)?;
        validate_name("Last name", &registration.last_name)?;
        validate_password(&registration.password).map_err(AccountError::InvalidInput)?;

        if let Some(existing) = self.db.users().get_by_email(&email).await? {
            if existing.account_state != AccountState::Unconfirmed {
                debug!(user_id = existing.id, "Registration for existing account");
                return Err(AccountError::AlreadyExists);
            }

            let code = self
                .db
                .confirmation_codes()
                .regenerate_or_create(existing.id, self.confirmation_ttl(now), now)
                .await?;
            self.mailer
                .send_confirmation(&email, &confirmation_link(&self.frontend_url, &code));
            info!(user_id = existing.id, "Confirmation code resent");

            return Ok(Registered {
                user_id: existing.id,
                subject_id: existing.uuid,
                email,
                role: existing.role,
                confirmation_resent: true,
            });
        }

        let password_hash = hash_blocking(self.encoder, registration.password).await?;
        let uuid = Uuid::new_v4().to_string();

        let user_id = self
            .db
            .users()
            .create(&NewUser {
                uuid: &uuid,
                email: &email,
                password_hash: &password_hash,
                first_name: registration.first_name.trim(),
                last_name: registration.last_name.trim(),
            })
            .await
            .map_err(|e| {
                // Lost a race with a concurrent registration for the same email.
                if e.as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation())
                {
                    AccountError::AlreadyExists
                } else {
                    AccountError::Database(e)
                }
            })?;

        let code = self
            .db
            .confirmation_codes()
            .generate(user_id, self.confirmation_ttl(now), now)
            .await?;
        self.mailer
            .send_confirmation(&email, &confirmation_link(&self.frontend_url, &code));
        info!(user_id, "User registered");

        Ok(Registered {
            user_id,
            subject_id: uuid,
            email,
            role: UserRole::User,
            confirmation_resent: false,
        })
    }

    /// Consume a confirmation code, activate the account and log it in.
    pub async fn confirm(&self, code: &str, now: u64) -> Result<TokenPair, AccountError> {
        let user_id = self
            .db
            .confirmation_codes()
            .consume_if_valid(code, now)
            .await
            .inspect_err(|e| warn!("Confirmation failed: {}", e))?;

        let user = self
            .db
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or(AccountError::TokenNotFound)?;

        if user.account_state == AccountState::Banned {
            warn!(user_id, "Confirmation for locked account");
            return Err(AccountError::Locked);
        }

        self.db.users().confirm(user_id).await?;
        info!(user_id, "Email confirmed");

        self.codec
            .issue_pair(&user.email, now)
            .map_err(AccountError::Token)
    }

    /// Email a reset link if the account exists. Unknown emails succeed silently.
    pub async fn request_password_reset(&self, email: &str, now: u64) -> Result<(), AccountError> {
        let email = normalize_email(email);

        let Some(user) = self.db.users().get_by_email(&email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.db.password_resets().create(user.id, now).await?;
        self.mailer
            .send_password_reset(&user.email, &password_reset_link(&self.frontend_url, &token));
        info!(user_id = user.id, "Password reset requested");

        Ok(())
    }

    /// Set a new password using a reset token.
    ///
    /// The token is spent as soon as it is looked up, even if storing the new
    /// password then fails.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: String,
        now: u64,
    ) -> Result<(), AccountError> {
        validate_password(&new_password).map_err(AccountError::InvalidInput)?;

        let user_id = self
            .db
            .password_resets()
            .consume_if_valid(token, now)
            .await
            .inspect_err(|e| warn!("Password reset failed: {}", e))?;

        let password_hash = hash_blocking(self.encoder, new_password).await?;

        if !self.db.users().update_password(user_id, &password_hash).await? {
            error!(user_id, "Password reset for deleted user");
            return Err(AccountError::TokenNotFound);
        }

        info!(user_id, "Password reset");
        Ok(())
    }

    /// Replace the password of a signed-in user who knows the current one.
    pub async fn change_password(
        &self,
        principal: &Principal,
        current_password: String,
        new_password: String,
        confirm_new_password: &str,
    ) -> Result<(), AccountError> {
        if new_password != confirm_new_password {
            return Err(AccountError::InvalidInput(
                "New password and confirmation do not match".into(),
            ));
        }

        let user_id = principal.user_id;
        let user = self
            .db
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or(AccountError::UnknownUser)?;

        let verdict = verify_blocking(Arc::new(self.encoder), user, current_password).await?;
        if verdict == MatchResult::Mismatch {
            warn!(user_id, "Password change failed: wrong current password");
            return Err(AccountError::InvalidInput(
                "Current password is incorrect".into(),
            ));
        }

        validate_password(&new_password).map_err(AccountError::InvalidInput)?;

        let password_hash = hash_blocking(self.encoder, new_password).await?;
        if !self.db.users().update_password(user_id, &password_hash).await? {
            return Err(AccountError::UnknownUser);
        }

        info!(user_id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::auth::{CredentialVerifier, MatchResult};
    use crate::db::PASSWORD_RESET_TTL_SECS;
    use crate::jwt::TokenKind;
    use crate::jwt::tests::test_settings;

    const NOW: u64 = 1_700_000_000;
    const DAY: u64 = 24 * 60 * 60;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, Url)>>,
    }

    impl Outbox {
        fn last_query_value(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let (_, link) = sent.last().unwrap();
            link.query_pairs().next().unwrap().1.into_owned()
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Mailer for Outbox {
        fn send_confirmation(&self, to: &str, link: &Url) {
            self.sent.lock().unwrap().push((to.to_string(), link.clone()));
        }

        fn send_password_reset(&self, to: &str, link: &Url) {
            self.sent.lock().unwrap().push((to.to_string(), link.clone()));
        }
    }

    async fn service() -> (AccountService, Arc<Outbox>) {
        let db = Database::open(":memory:").await.unwrap();
        let outbox = Arc::new(Outbox::default());
        let service = AccountService::new(
            db,
            Arc::new(TokenCodec::new(&test_settings()).unwrap()),
            PasswordEncoder::new(4),
            outbox.clone(),
            Url::parse("http://localhost:5173").unwrap(),
            5,
        );
        (service, outbox)
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "Kim".to_string(),
            last_name: "Keeper".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_confirm() {
        let (service, outbox) = service().await;

        let registered = service
            .register(registration("Kim@Example.com"), NOW)
            .await
            .unwrap();
        assert_eq!(registered.email, "kim@example.com");
        assert!(!registered.confirmation_resent);
        assert_eq!(outbox.count(), 1);

        let code = outbox.last_query_value();
        let pair = service.confirm(&code, NOW + 60).await.unwrap();
        assert_eq!(
            service
                .codec
                .subject_of(&pair.access.token, TokenKind::Access, NOW + 60)
                .unwrap(),
            "kim@example.com"
        );

        let user = service.db.users().get_by_id(registered.user_id).await.unwrap().unwrap();
        assert_eq!(user.account_state, AccountState::Confirmed);
        assert!(PasswordEncoder::new(4).verify(&user, "password123") == MatchResult::Match);

        // The code is single use.
        assert!(matches!(
            service.confirm(&code, NOW + 120).await,
            Err(AccountError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_register_again_while_unconfirmed_extends_code() {
        let (service, outbox) = service().await;

        let first = service.register(registration("kim@example.com"), NOW).await.unwrap();
        let first_code = outbox.last_query_value();

        let second = service
            .register(registration("kim@example.com"), NOW + DAY)
            .await
            .unwrap();
        assert!(second.confirmation_resent);
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(outbox.last_query_value(), first_code);

        let stored = service
            .db
            .confirmation_codes()
            .find_by_user(first.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.expires_at, end_of_day_after(NOW + DAY, 5) as i64);
    }

    #[tokio::test]
    async fn test_register_confirmed_email_conflicts() {
        let (service, outbox) = service().await;

        service.register(registration("kim@example.com"), NOW).await.unwrap();
        service.confirm(&outbox.last_query_value(), NOW).await.unwrap();

        assert!(matches!(
            service.register(registration("KIM@example.com"), NOW).await,
            Err(AccountError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let (service, _) = service().await;

        for email in ["", "no-at-sign", "@example.com", "kim@", "kim @example.com"] {
            assert!(matches!(
                service.register(registration(email), NOW).await,
                Err(AccountError::InvalidInput(_))
            ));
        }

        let mut short = registration("kim@example.com");
        short.password = "short".to_string();
        assert!(matches!(
            service.register(short, NOW).await,
            Err(AccountError::InvalidInput(_))
        ));

        let mut nameless = registration("kim@example.com");
        nameless.first_name = "  ".to_string();
        assert!(matches!(
            service.register(nameless, NOW).await,
            Err(AccountError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_end_of_day_after() {
        let midnight = 1_699_920_000;
        assert_eq!(midnight % DAY, 0);

        assert_eq!(end_of_day_after(midnight, 0), midnight + DAY - 1);
        assert_eq!(end_of_day_after(midnight + DAY - 1, 0), midnight + DAY - 1);
        assert_eq!(end_of_day_after(midnight + 5, 5), midnight + 6 * DAY - 1);
    }

    #[tokio::test]
    async fn test_confirmation_code_lasts_until_end_of_day() {
        let (service, outbox) = service().await;

        let registered = service.register(registration("kim@example.com"), NOW).await.unwrap();
        let stored = service
            .db
            .confirmation_codes()
            .find_by_user(registered.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.expires_at, end_of_day_after(NOW, 5) as i64);

        let code = outbox.last_query_value();
        assert!(service.confirm(&code, end_of_day_after(NOW, 5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_confirmation_code() {
        let (service, outbox) = service().await;

        service.register(registration("kim@example.com"), NOW).await.unwrap();
        let code = outbox.last_query_value();

        assert!(matches!(
            service.confirm(&code, end_of_day_after(NOW, 5) + 1).await,
            Err(AccountError::TokenExpired)
        ));
        assert!(matches!(
            service.confirm(&code, NOW).await,
            Err(AccountError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (service, outbox) = service().await;
        let registered = service.register(registration("kim@example.com"), NOW).await.unwrap();

        service
            .request_password_reset("KIM@example.com", NOW)
            .await
            .unwrap();
        let token = outbox.last_query_value();

        service
            .reset_password(&token, "brand-new-password".to_string(), NOW + 60)
            .await
            .unwrap();

        let user = service.db.users().get_by_id(registered.user_id).await.unwrap().unwrap();
        assert_eq!(
            PasswordEncoder::new(4).verify(&user, "brand-new-password"),
            MatchResult::Match
        );

        // Second use fails and leaves the password alone.
        assert!(matches!(
            service
                .reset_password(&token, "another-password".to_string(), NOW + 60)
                .await,
            Err(AccountError::TokenNotFound)
        ));
        let user = service.db.users().get_by_id(registered.user_id).await.unwrap().unwrap();
        assert_eq!(
            PasswordEncoder::new(4).verify(&user, "brand-new-password"),
            MatchResult::Match
        );
    }

    #[tokio::test]
    async fn test_password_reset_for_unknown_email_is_silent() {
        let (service, outbox) = service().await;

        service
            .request_password_reset("nobody@example.com", NOW)
            .await
            .unwrap();

        assert_eq!(outbox.count(), 0);
        assert_eq!(service.db.password_resets().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_password_reset_token_expires() {
        let (service, outbox) = service().await;
        service.register(registration("kim@example.com"), NOW).await.unwrap();
        service.request_password_reset("kim@example.com", NOW).await.unwrap();
        let token = outbox.last_query_value();

        assert!(matches!(
            service
                .reset_password(
                    &token,
                    "brand-new-password".to_string(),
                    NOW + PASSWORD_RESET_TTL_SECS + 1
                )
                .await,
            Err(AccountError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_weak_new_password_keeps_token() {
        let (service, outbox) = service().await;
        service.register(registration("kim@example.com"), NOW).await.unwrap();
        service.request_password_reset("kim@example.com", NOW).await.unwrap();
        let token = outbox.last_query_value();

        assert!(matches!(
            service.reset_password(&token, "short".to_string(), NOW).await,
            Err(AccountError::InvalidInput(_))
        ));
        assert!(
            service
                .reset_password(&token, "long-enough-now".to_string(), NOW)
                .await
                .is_ok()
        );
    }

    async fn confirmed_principal(service: &AccountService, outbox: &Outbox) -> Principal {
        let registered = service.register(registration("kim@example.com"), NOW).await.unwrap();
        service.confirm(&outbox.last_query_value(), NOW).await.unwrap();
        let user = service.db.users().get_by_id(registered.user_id).await.unwrap().unwrap();
        Principal::from(&user)
    }

    #[tokio::test]
    async fn test_change_password() {
        let (service, outbox) = service().await;
        let principal = confirmed_principal(&service, &outbox).await;

        service
            .change_password(
                &principal,
                "password123".to_string(),
                "brand-new-password".to_string(),
                "brand-new-password",
            )
            .await
            .unwrap();

        let user = service.db.users().get_by_id(principal.user_id).await.unwrap().unwrap();
        assert_eq!(
            PasswordEncoder::new(4).verify(&user, "brand-new-password"),
            MatchResult::Match
        );
        assert_eq!(
            PasswordEncoder::new(4).verify(&user, "password123"),
            MatchResult::Mismatch
        );
    }

    #[tokio::test]
    async fn test_change_password_rejections_leave_password_alone() {
        let (service, outbox) = service().await;
        let principal = confirmed_principal(&service, &outbox).await;

        let mismatch = service
            .change_password(
                &principal,
                "password123".to_string(),
                "brand-new-password".to_string(),
                "brand-new-passwort",
            )
            .await;
        assert!(matches!(mismatch, Err(AccountError::InvalidInput(msg)) if msg.contains("do not match")));

        let wrong_current = service
            .change_password(
                &principal,
                "not-my-password".to_string(),
                "brand-new-password".to_string(),
                "brand-new-password",
            )
            .await;
        assert!(matches!(wrong_current, Err(AccountError::InvalidInput(msg)) if msg == "Current password is incorrect"));

        let too_short = service
            .change_password(&principal, "password123".to_string(), "short".to_string(), "short")
            .await;
        assert!(matches!(too_short, Err(AccountError::InvalidInput(_))));

        let user = service.db.users().get_by_id(principal.user_id).await.unwrap().unwrap();
        assert_eq!(
            PasswordEncoder::new(4).verify(&user, "password123"),
            MatchResult::Match
        );
    }
}
