//! Signed session tokens: issuance, validation and rotation.
//!
//! Tokens are compact HS256 JWS values. The manager is stateless apart from
//! its immutable key material; refresh-token bookkeeping lives in the
//! session store collaborator.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use eventhub_core::UserId;

use crate::claims::{timestamp, WireClaims};
use crate::{Claims, Role, TokenKind};

/// Minimum accepted signing secret length, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Upper bound for either token lifetime.
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 3650;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

const BEARER_PREFIX: &str = "Bearer ";

/// Key material and lifetime policy for a [`TokenManager`].
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Clock-skew allowance applied by expiry/not-before validation.
    pub leeway_secs: u64,
}

impl TokenConfig {
    /// Config with default lifetimes: 15 minutes access, 7 days refresh.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "eventhub".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            leeway_secs: 0,
        }
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

/// Startup failure: the manager refuses to exist with a weak configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("signing secret must be at least 32 bytes (got {0})")]
    SecretTooShort(usize),

    #[error("token lifetimes must satisfy 0 < access ({access}s) < refresh ({refresh}s)")]
    InvalidLifetimes { access: i64, refresh: i64 },

    #[error("token lifetimes must not exceed {max_days} days")]
    LifetimeTooLong { max_days: i64 },

    #[error("issuer must not be empty")]
    MissingIssuer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid token type: expected {expected} token")]
    InvalidTokenType { expected: TokenKind },

    #[error("token carries invalid claims")]
    InvalidClaims,

    #[error("failed to sign token")]
    Signing,

    #[error("token expiry is out of range")]
    ExpiryOutOfRange,

    #[error("failed to refresh token: {0}")]
    Refresh(Box<TokenError>),
}

impl TokenError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::MissingField(_) => "validation_error",
            TokenError::InvalidToken => "invalid_token",
            TokenError::ExpiredToken => "expired_token",
            TokenError::InvalidTokenType { .. } => "invalid_token_type",
            TokenError::InvalidClaims => "invalid_claims",
            TokenError::Signing | TokenError::ExpiryOutOfRange => "token_issue_failed",
            TokenError::Refresh(inner) => inner.code(),
        }
    }

    /// The underlying validation failure, looking through refresh wrapping.
    pub fn root(&self) -> &TokenError {
        match self {
            TokenError::Refresh(inner) => inner.root(),
            other => other,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    #[error("authorization header is required")]
    MissingHeader,

    #[error("authorization header must use the Bearer scheme")]
    InvalidScheme,

    #[error("bearer token is empty")]
    EmptyToken,
}

/// Freshly issued access/refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub token_type: &'static str,
    #[serde(skip)]
    pub access_token_id: String,
    #[serde(skip)]
    pub refresh_token_id: String,
}

/// Issues, validates and rotates session tokens.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    peek_validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway_secs: u64,
}

impl core::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenManager")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(config: TokenConfig) -> Result<Self, TokenConfigError> {
        if config.secret.len() < MIN_SECRET_LEN {
            return Err(TokenConfigError::SecretTooShort(config.secret.len()));
        }
        if config.issuer.trim().is_empty() {
            return Err(TokenConfigError::MissingIssuer);
        }
        if config.access_ttl <= Duration::zero() || config.refresh_ttl <= config.access_ttl {
            return Err(TokenConfigError::InvalidLifetimes {
                access: config.access_ttl.num_seconds(),
                refresh: config.refresh_ttl.num_seconds(),
            });
        }
        if config.refresh_ttl > Duration::days(MAX_TOKEN_LIFETIME_DAYS) {
            return Err(TokenConfigError::LifetimeTooLong {
                max_days: MAX_TOKEN_LIFETIME_DAYS,
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        // Signature and issuer still checked; time window ignored.
        let mut peek_validation = Validation::new(Algorithm::HS256);
        peek_validation.validate_exp = false;
        peek_validation.validate_nbf = false;
        peek_validation.set_issuer(&[config.issuer.as_str()]);
        peek_validation.required_spec_claims.clear();

        Ok(Self {
            encoding: EncodingKey::from_secret(&config.secret),
            decoding: DecodingKey::from_secret(&config.secret),
            validation,
            peek_validation,
            issuer: config.issuer,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            leeway_secs: config.leeway_secs,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue_token_pair(
        &self,
        subject: &UserId,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, TokenError> {
        self.issue_token_pair_at(subject, email, role, Utc::now())
    }

    /// Issue a pair as if the current time were `issued_at`.
    pub fn issue_token_pair_at(
        &self,
        subject: &UserId,
        email: &str,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        if subject.as_str().trim().is_empty() {
            return Err(TokenError::MissingField("subject"));
        }
        if email.trim().is_empty() {
            return Err(TokenError::MissingField("email"));
        }

        let access_token_id = Uuid::new_v4().to_string();
        let refresh_token_id = Uuid::new_v4().to_string();
        let (Some(access_expires_at), Some(refresh_expires_at)) = (
            issued_at.checked_add_signed(self.access_ttl),
            issued_at.checked_add_signed(self.refresh_ttl),
        ) else {
            tracing::error!(%issued_at, "token expiry overflows the calendar");
            return Err(TokenError::ExpiryOutOfRange);
        };

        let access_token = self.sign(
            subject,
            email,
            role,
            &access_token_id,
            TokenKind::Access,
            issued_at,
            access_expires_at,
        )?;
        let refresh_token = self.sign(
            subject,
            email,
            role,
            &refresh_token_id,
            TokenKind::Refresh,
            issued_at,
            refresh_expires_at,
        )?;

        tracing::debug!(
            subject = %subject,
            role = %role,
            access_token_id = %access_token_id,
            refresh_token_id = %refresh_token_id,
            "issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: TOKEN_TYPE_BEARER,
            access_token_id,
            refresh_token_id,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn sign(
        &self,
        subject: &UserId,
        email: &str,
        role: Role,
        token_id: &str,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = WireClaims {
            sub: subject.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            jti: token_id.to_string(),
            token_type: kind,
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "token signing failed");
            TokenError::Signing
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token(token, TokenKind::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token(token, TokenKind::Refresh)
    }

    /// Verify signature, algorithm, issuer, time window and kind of `token`.
    pub fn validate_token(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::InvalidToken);
        }

        let wire = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                other => {
                    tracing::debug!(reason = ?other, "token rejected");
                    TokenError::InvalidToken
                }
            })?
            .claims;

        if wire.token_type != expected {
            return Err(TokenError::InvalidTokenType { expected });
        }

        into_claims(wire)
    }

    /// Validate `refresh_token` and issue a brand-new pair for the same identity.
    pub fn refresh_token_pair(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self
            .validate_refresh_token(refresh_token)
            .map_err(|e| TokenError::Refresh(Box::new(e)))?;

        self.issue_token_pair(&claims.subject, &claims.email, claims.role)
            .map_err(|e| TokenError::Refresh(Box::new(e)))
    }

    /// Read the claims of a correctly signed token regardless of its expiry.
    ///
    /// Never use the result for authorization decisions.
    pub fn peek_claims(&self, token: &str) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::InvalidToken);
        }
        let wire = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.peek_validation)
            .map_err(|_| TokenError::InvalidToken)?
            .claims;
        into_claims(wire)
    }

    /// Whether `token` is past its expiry, using the leeway that validation applies.
    /// Expiry is an answer here, not an error.
    pub fn is_token_expired(&self, token: &str) -> Result<bool, TokenError> {
        let claims = self.peek_claims(token)?;
        let leeway = i64::try_from(self.leeway_secs).unwrap_or(i64::MAX);
        let deadline = Utc::now().timestamp().saturating_sub(leeway);
        Ok(claims.expires_at.timestamp() < deadline)
    }
}

fn into_claims(wire: WireClaims) -> Result<Claims, TokenError> {
    if wire.sub.is_empty() || wire.email.is_empty() || wire.role.is_empty() {
        return Err(TokenError::InvalidClaims);
    }
    let role = wire.role.parse::<Role>().map_err(|_| TokenError::InvalidClaims)?;

    Ok(Claims {
        subject: UserId::new(wire.sub),
        email: wire.email,
        role,
        token_id: wire.jti,
        kind: wire.token_type,
        issued_at: timestamp(wire.iat),
        expires_at: timestamp(wire.exp),
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The remainder after the single required space is returned verbatim; extra
/// leading whitespace is not trimmed.
pub fn extract_bearer_token(header: &str) -> Result<&str, BearerError> {
    if header.is_empty() {
        return Err(BearerError::MissingHeader);
    }
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(BearerError::InvalidScheme)?;
    if token.is_empty() {
        return Err(BearerError::EmptyToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn manager() -> TokenManager {
        TokenManager::new(TokenConfig::new(SECRET)).unwrap()
    }

    fn subject() -> UserId {
        UserId::new("user-1")
    }

    fn forge(claims: &WireClaims, secret: &str, alg: Algorithm) -> String {
        jsonwebtoken::encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn wire(kind: TokenKind) -> WireClaims {
        let now = Utc::now().timestamp();
        WireClaims {
            sub: "user-1".to_string(),
            email: "a@example.com".to_string(),
            role: "user".to_string(),
            jti: "jti-1".to_string(),
            token_type: kind,
            iss: "eventhub".to_string(),
            iat: now,
            nbf: now,
            exp: now + 600,
        }
    }

    #[test]
    fn secret_length_boundary() {
        let short = "x".repeat(MIN_SECRET_LEN - 1);
        assert_eq!(
            TokenManager::new(TokenConfig::new(short)).unwrap_err(),
            TokenConfigError::SecretTooShort(31)
        );
        assert!(TokenManager::new(TokenConfig::new("x".repeat(MIN_SECRET_LEN))).is_ok());
    }

    #[test]
    fn refresh_lifetime_must_exceed_access_lifetime() {
        let mut config = TokenConfig::new(SECRET);
        config.refresh_ttl = config.access_ttl;
        assert!(matches!(
            TokenManager::new(config),
            Err(TokenConfigError::InvalidLifetimes { .. })
        ));
    }

    #[test]
    fn overlong_lifetimes_are_rejected_at_construction() {
        let mut config = TokenConfig::new(SECRET);
        config.refresh_ttl = Duration::seconds(10_000_000_000_000);
        assert_eq!(
            TokenManager::new(config).unwrap_err(),
            TokenConfigError::LifetimeTooLong {
                max_days: MAX_TOKEN_LIFETIME_DAYS
            }
        );

        let mut config = TokenConfig::new(SECRET);
        config.refresh_ttl = Duration::days(MAX_TOKEN_LIFETIME_DAYS);
        assert!(TokenManager::new(config).is_ok());
    }

    #[test]
    fn expiry_overflow_is_an_error() {
        let m = manager();
        let err = m
            .issue_token_pair_at(&subject(), "a@example.com", Role::User, DateTime::<Utc>::MAX_UTC)
            .unwrap_err();
        assert_eq!(err, TokenError::ExpiryOutOfRange);
        assert_eq!(err.code(), "token_issue_failed");
    }

    #[test]
    fn expiry_status_honours_the_validation_leeway() {
        let mut config = TokenConfig::new(SECRET);
        config.leeway_secs = 60;
        let lenient = TokenManager::new(config).unwrap();
        let strict = manager();

        // Access token expired ten seconds ago.
        let issued_at = Utc::now() - Duration::minutes(15) - Duration::seconds(10);
        let pair = lenient
            .issue_token_pair_at(&subject(), "a@example.com", Role::User, issued_at)
            .unwrap();

        assert!(lenient.validate_access_token(&pair.access_token).is_ok());
        assert!(!lenient.is_token_expired(&pair.access_token).unwrap());

        assert_eq!(
            strict.validate_access_token(&pair.access_token),
            Err(TokenError::ExpiredToken)
        );
        assert!(strict.is_token_expired(&pair.access_token).unwrap());
    }

    #[test]
    fn issue_rejects_empty_fields() {
        let m = manager();
        assert_eq!(
            m.issue_token_pair(&UserId::new(""), "a@example.com", Role::User),
            Err(TokenError::MissingField("subject"))
        );
        assert_eq!(
            m.issue_token_pair(&subject(), "", Role::User),
            Err(TokenError::MissingField("email"))
        );
    }

    #[test]
    fn pair_has_bearer_type_and_ordered_expiries() {
        let pair = manager()
            .issue_token_pair(&subject(), "a@example.com", Role::Organizer)
            .unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert!(pair.refresh_expires_at > pair.access_expires_at);
        assert_ne!(pair.access_token_id, pair.refresh_token_id);
        assert_eq!(pair.access_token.split('.').count(), 3);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let m = manager();
        let pair = m.issue_token_pair(&subject(), "a@example.com", Role::User).unwrap();

        assert_eq!(
            m.validate_access_token(&pair.refresh_token),
            Err(TokenError::InvalidTokenType { expected: TokenKind::Access })
        );
        assert_eq!(
            m.validate_refresh_token(&pair.access_token),
            Err(TokenError::InvalidTokenType { expected: TokenKind::Refresh })
        );
        assert_eq!(m.validate_refresh_token(&pair.refresh_token).unwrap().kind, TokenKind::Refresh);
    }

    #[test]
    fn refresh_rotates_both_token_ids() {
        let m = manager();
        let first = m.issue_token_pair(&subject(), "a@example.com", Role::Admin).unwrap();
        let second = m.refresh_token_pair(&first.refresh_token).unwrap();
        let third = m.refresh_token_pair(&second.refresh_token).unwrap();

        let ids = [
            &first.access_token_id,
            &first.refresh_token_id,
            &second.access_token_id,
            &second.refresh_token_id,
            &third.access_token_id,
            &third.refresh_token_id,
        ];
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let claims = m.validate_access_token(&third.access_token).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn refresh_with_access_token_keeps_the_type_error_code() {
        let m = manager();
        let pair = m.issue_token_pair(&subject(), "a@example.com", Role::User).unwrap();
        let err = m.refresh_token_pair(&pair.access_token).unwrap_err();

        assert_eq!(err.code(), "invalid_token_type");
        assert!(err.to_string().starts_with("failed to refresh token"));
        assert_eq!(err.root(), &TokenError::InvalidTokenType { expected: TokenKind::Refresh });
    }

    #[test]
    fn expired_tokens_report_expiry_not_invalidity() {
        let m = manager();
        let issued_at = Utc::now() - Duration::hours(1);
        let pair = m
            .issue_token_pair_at(&subject(), "a@example.com", Role::User, issued_at)
            .unwrap();

        assert_eq!(m.validate_access_token(&pair.access_token), Err(TokenError::ExpiredToken));
        // Refresh lifetime (7 days) has not elapsed yet.
        assert!(m.validate_refresh_token(&pair.refresh_token).is_ok());
        assert!(m.is_token_expired(&pair.access_token).unwrap());
        assert!(!m.is_token_expired(&pair.refresh_token).unwrap());
        assert_eq!(m.peek_claims(&pair.access_token).unwrap().subject, subject());
    }

    #[test]
    fn garbage_and_foreign_signatures_are_invalid() {
        let m = manager();
        assert_eq!(m.validate_access_token(""), Err(TokenError::InvalidToken));
        assert_eq!(m.validate_access_token("not.a.jwt"), Err(TokenError::InvalidToken));

        let foreign = forge(
            &wire(TokenKind::Access),
            "another-secret-another-secret-123",
            Algorithm::HS256,
        );
        assert_eq!(m.validate_access_token(&foreign), Err(TokenError::InvalidToken));
        assert_eq!(m.peek_claims(&foreign), Err(TokenError::InvalidToken));
    }

    #[test]
    fn unexpected_algorithm_is_invalid() {
        let m = manager();
        let token = forge(&wire(TokenKind::Access), SECRET, Algorithm::HS512);
        assert_eq!(m.validate_access_token(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn foreign_issuer_is_invalid() {
        let m = manager();
        let mut claims = wire(TokenKind::Access);
        claims.iss = "someone-else".to_string();
        assert_eq!(
            m.validate_access_token(&forge(&claims, SECRET, Algorithm::HS256)),
            Err(TokenError::InvalidToken)
        );
    }

    #[test]
    fn empty_identity_fields_are_invalid_claims() {
        let m = manager();
        for mutate in [
            (|c: &mut WireClaims| c.sub.clear()) as fn(&mut WireClaims),
            |c: &mut WireClaims| c.email.clear(),
            |c: &mut WireClaims| c.role.clear(),
            |c: &mut WireClaims| c.role = "root".to_string(),
        ] {
            let mut claims = wire(TokenKind::Access);
            mutate(&mut claims);
            assert_eq!(
                m.validate_access_token(&forge(&claims, SECRET, Algorithm::HS256)),
                Err(TokenError::InvalidClaims)
            );
        }
    }

    #[test]
    fn bearer_extraction_errors_are_distinct() {
        let errors = [
            extract_bearer_token("").unwrap_err(),
            extract_bearer_token("Basic abc").unwrap_err(),
            extract_bearer_token("Bearer ").unwrap_err(),
        ];
        assert_eq!(
            errors,
            [
                BearerError::MissingHeader,
                BearerError::InvalidScheme,
                BearerError::EmptyToken
            ]
        );

        let messages: std::collections::HashSet<String> =
            errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), 3);

        assert_eq!(extract_bearer_token("bearer abc"), Err(BearerError::InvalidScheme));
        assert_eq!(extract_bearer_token("Bearer  abc"), Ok(" abc"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn bearer_round_trips(token in "[A-Za-z0-9._~+/=-]{1,128}") {
            let header = format!("Bearer {token}");
            prop_assert_eq!(extract_bearer_token(&header), Ok(token.as_str()));
        }

        #[test]
        fn issued_access_tokens_validate_to_their_identity(
            sub in "[a-z0-9-]{1,36}",
            email in "[a-z]{1,12}@[a-z]{1,12}\\.com",
            role_idx in 0usize..3,
        ) {
            let m = manager();
            let role = Role::ALL[role_idx];
            let pair = m.issue_token_pair(&UserId::new(sub.clone()), &email, role).unwrap();
            let claims = m.validate_access_token(&pair.access_token).unwrap();

            prop_assert_eq!(claims.subject.as_str(), sub.as_str());
            prop_assert_eq!(claims.email, email);
            prop_assert_eq!(claims.role, role);
            prop_assert_eq!(claims.kind, TokenKind::Access);
            prop_assert_eq!(claims.token_id, pair.access_token_id);
        }
    }
}
