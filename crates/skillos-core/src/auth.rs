//! Authentication against the hosted auth provider.
//!
//! The protocol itself lives on the provider. This module validates input
//! locally (so malformed input never reaches the network), maps provider
//! errors onto [`AuthError`], enforces the OTP resend cooldown and keeps the
//! session token in the OS keyring.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{self, BackendClient};
use crate::error::{AuthError, CoreError, Result, ValidationError};
use crate::storage::keyring_store;

const SERVICE: &str = "auth";

/// Seconds before another OTP may be requested for the same number.
pub const OTP_RESEND_COOLDOWN_SECS: i64 = 60;
pub const OTP_LENGTH: usize = 6;

// ── Local validation ─────────────────────────────────────────────────

/// Strip whitespace, dashes and parentheses.
pub fn sanitize_phone(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// Normalize to E.164: `+`, a non-zero leading digit, 2 to 15 digits total.
pub fn normalize_phone(input: &str) -> Result<String, ValidationError> {
    let clean = sanitize_phone(input);
    let invalid = || ValidationError::InvalidPhone {
        input: input.to_string(),
    };
    let digits = clean.strip_prefix('+').ok_or_else(invalid)?;
    let well_formed = (2..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    if !well_formed {
        return Err(invalid());
    }
    Ok(clean)
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    Ok(())
}

/// Keep digits only, at most [`OTP_LENGTH`] of them.
pub fn sanitize_otp(code: &str) -> String {
    code.chars()
        .filter(char::is_ascii_digit)
        .take(OTP_LENGTH)
        .collect()
}

// ── Provider contract ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

/// What a successful call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    SignedIn { session: AuthSession },
    /// Sign-up accepted; the provider wants the address confirmed first.
    ConfirmationRequired { email: String },
    OtpSent { phone: String },
    SignedOut,
}

/// The hosted auth provider. Inputs are already validated.
#[allow(async_fn_in_trait)]
pub trait AuthProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthOutcome>;
    async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<AuthOutcome>;
    async fn sign_in_with_otp(&self, phone_e164: &str) -> Result<AuthOutcome>;
    async fn verify_otp(&self, phone_e164: &str, code: &str) -> Result<AuthOutcome>;
    async fn sign_out(&self, access_token: &str) -> Result<AuthOutcome>;
}

/// Map a non-2xx provider response onto [`AuthError`].
pub fn map_auth_failure(status: u16, body: &serde_json::Value) -> AuthError {
    let message = backend::error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    if status == 429 || message == "Rate limit exceeded" {
        return AuthError::RateLimit;
    }
    AuthError::Rejected { status, message }
}

/// REST client for the hosted auth API (`/auth/v1/*`).
#[derive(Debug, Clone)]
pub struct HostedAuthClient {
    backend: BackendClient,
}

impl HostedAuthClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        self.post_with_token(path, body, None).await
    }

    async fn post_with_token(
        &self,
        path: &str,
        body: serde_json::Value,
        token: Option<&str>,
    ) -> Result<serde_json::Value> {
        let url = self.backend.endpoint(path)?;
        let request = match token {
            Some(token) => self.backend.request_as(Method::POST, url, token),
            None => self.backend.request(Method::POST, url),
        }
        .json(&body);
        let resp = backend::send(SERVICE, request).await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        if status.is_success() {
            return Ok(body);
        }
        let err = map_auth_failure(status.as_u16(), &body);
        tracing::warn!(path, status = status.as_u16(), "auth request rejected: {err}");
        Err(err.into())
    }

    fn parse_session(body: serde_json::Value) -> Result<AuthSession> {
        serde_json::from_value(body).map_err(|e| {
            CoreError::network(SERVICE, format!("unexpected session payload: {e}"))
        })
    }
}

impl AuthProvider for HostedAuthClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let body = self
            .post(
                "/auth/v1/token?grant_type=password",
                json!({ "email": email, "password": password }),
            )
            .await?;
        Ok(AuthOutcome::SignedIn {
            session: Self::parse_session(body)?,
        })
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let body = self
            .post(
                "/auth/v1/signup",
                json!({ "email": email, "password": password }),
            )
            .await?;
        // With email confirmation disabled the provider signs the user in directly.
        if body.get("access_token").is_some() {
            return Ok(AuthOutcome::SignedIn {
                session: Self::parse_session(body)?,
            });
        }
        Ok(AuthOutcome::ConfirmationRequired {
            email: email.to_string(),
        })
    }

    async fn sign_in_with_otp(&self, phone_e164: &str) -> Result<AuthOutcome> {
        self.post("/auth/v1/otp", json!({ "phone": phone_e164 }))
            .await?;
        Ok(AuthOutcome::OtpSent {
            phone: phone_e164.to_string(),
        })
    }

    async fn verify_otp(&self, phone_e164: &str, code: &str) -> Result<AuthOutcome> {
        let body = self
            .post(
                "/auth/v1/verify",
                json!({ "phone": phone_e164, "token": code, "type": "sms" }),
            )
            .await?;
        Ok(AuthOutcome::SignedIn {
            session: Self::parse_session(body)?,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<AuthOutcome> {
        self.post_with_token("/auth/v1/logout", json!({}), Some(access_token))
            .await?;
        Ok(AuthOutcome::SignedOut)
    }
}

// ── Flow ─────────────────────────────────────────────────────────────

/// Tracks when the last OTP was sent, per normalized number.
#[derive(Debug, Clone, Default)]
pub struct OtpCooldown {
    last_sent: Option<(String, DateTime<Utc>)>,
}

impl OtpCooldown {
    pub fn remaining_secs(&self, phone: &str, now: DateTime<Utc>) -> u64 {
        match &self.last_sent {
            Some((sent_to, at)) if sent_to == phone => {
                let ready = *at + Duration::seconds(OTP_RESEND_COOLDOWN_SECS);
                (ready - now).num_seconds().max(0) as u64
            }
            _ => 0,
        }
    }

    pub fn record(&mut self, phone: &str, now: DateTime<Utc>) {
        self.last_sent = Some((phone.to_string(), now));
    }
}

/// Form-level auth flow over any provider.
///
/// Validation errors are returned before the provider is called. Every
/// attempt clears the previous success message.
#[derive(Debug)]
pub struct AuthFlow<P> {
    provider: P,
    cooldown: OtpCooldown,
    success_message: Option<String>,
}

impl<P: AuthProvider> AuthFlow<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cooldown: OtpCooldown::default(),
            success_message: None,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn success_message(&self) -> Option<&str> {
        self.success_message.as_deref()
    }

    pub async fn sign_in_with_password(&mut self, email: &str, password: &str) -> Result<AuthOutcome> {
        self.success_message = None;
        validate_credentials(email, password)?;
        self.provider.sign_in_with_password(email.trim(), password).await
    }

    pub async fn sign_up_with_password(&mut self, email: &str, password: &str) -> Result<AuthOutcome> {
        self.success_message = None;
        validate_credentials(email, password)?;
        let outcome = self
            .provider
            .sign_up_with_password(email.trim(), password)
            .await?;
        self.success_message = Some(match &outcome {
            AuthOutcome::ConfirmationRequired { .. } => {
                "Account created! Please check your email to verify.".to_string()
            }
            _ => "Account created!".to_string(),
        });
        Ok(outcome)
    }

    pub async fn sign_in_with_otp(&mut self, phone: &str, now: DateTime<Utc>) -> Result<AuthOutcome> {
        self.success_message = None;
        let phone = normalize_phone(phone)?;
        let remaining_secs = self.cooldown.remaining_secs(&phone, now);
        if remaining_secs > 0 {
            return Err(ValidationError::OtpCooldown { remaining_secs }.into());
        }
        let outcome = self.provider.sign_in_with_otp(&phone).await?;
        self.cooldown.record(&phone, now);
        self.success_message = Some(format!("Code sent to {phone}"));
        Ok(outcome)
    }

    pub async fn verify_otp(&mut self, phone: &str, code: &str) -> Result<AuthOutcome> {
        self.success_message = None;
        let phone = normalize_phone(phone)?;
        let code = sanitize_otp(code);
        if code.len() != OTP_LENGTH {
            return Err(ValidationError::InvalidOtp {
                expected: OTP_LENGTH,
            }
            .into());
        }
        self.provider.verify_otp(&phone, &code).await
    }

    pub async fn sign_out(&mut self, access_token: &str) -> Result<AuthOutcome> {
        self.success_message = None;
        self.provider.sign_out(access_token).await
    }
}

// ── Token storage ────────────────────────────────────────────────────

pub fn store_session(session: &AuthSession) -> Result<()> {
    keyring_store::set(keyring_store::ACCESS_TOKEN_KEY, &session.access_token)?;
    match &session.refresh_token {
        Some(token) => keyring_store::set(keyring_store::REFRESH_TOKEN_KEY, token)?,
        None => keyring_store::delete(keyring_store::REFRESH_TOKEN_KEY)?,
    }
    Ok(())
}

pub fn stored_access_token() -> Result<Option<String>> {
    keyring_store::get(keyring_store::ACCESS_TOKEN_KEY)
}

pub fn clear_session() -> Result<()> {
    keyring_store::delete(keyring_store::ACCESS_TOKEN_KEY)?;
    keyring_store::delete(keyring_store::REFRESH_TOKEN_KEY)?;
    Ok(())
}
