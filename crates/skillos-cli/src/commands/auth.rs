use chrono::Utc;
use clap::Subcommand;
use skillos_core::auth::{self, AuthFlow, AuthOutcome, HostedAuthClient};
use skillos_core::{AuthError, BackendClient, Config, CoreError};

use super::CmdResult;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Validate and normalize a phone number without contacting the server
    CheckPhone {
        phone: String,
    },
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account with email and password
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Send a one-time code to a phone number
    Otp {
        phone: String,
    },
    /// Verify a one-time code and sign in
    Verify {
        phone: String,
        code: String,
    },
    /// Sign out and forget the stored session
    SignOut,
    /// Show whether a session is stored
    Status,
}

/// Provider errors carry a friendlier banner message than their Display.
fn friendly(err: CoreError) -> Box<dyn std::error::Error> {
    match err {
        CoreError::Auth(e) => e.user_message().into(),
        CoreError::Validation(e) => e.to_string().into(),
        other => other.into(),
    }
}

fn flow() -> Result<AuthFlow<HostedAuthClient>, CoreError> {
    let config = Config::load()?;
    let backend = BackendClient::from_config(&config.backend)?;
    Ok(AuthFlow::new(HostedAuthClient::new(backend)))
}

fn report(outcome: &AuthOutcome) -> Result<(), CoreError> {
    match outcome {
        AuthOutcome::SignedIn { session } => {
            auth::store_session(session)?;
            let who = session
                .user
                .as_ref()
                .map(|u| u.email.clone().or_else(|| u.phone.clone()).unwrap_or_else(|| u.id.clone()))
                .unwrap_or_else(|| "unknown user".to_string());
            println!("signed in as {who}");
        }
        AuthOutcome::ConfirmationRequired { email } => {
            println!("confirmation sent to {email}");
        }
        AuthOutcome::OtpSent { phone } => println!("code sent to {phone}"),
        AuthOutcome::SignedOut => println!("signed out"),
    }
    Ok(())
}

async fn run_inner(action: AuthAction) -> Result<(), CoreError> {
    match action {
        AuthAction::CheckPhone { phone } => {
            println!("{}", auth::normalize_phone(&phone)?);
        }
        AuthAction::SignIn { email, password } => {
            let outcome = flow()?.sign_in_with_password(&email, &password).await?;
            report(&outcome)?;
        }
        AuthAction::SignUp { email, password } => {
            let mut flow = flow()?;
            let outcome = flow.sign_up_with_password(&email, &password).await?;
            if let Some(message) = flow.success_message() {
                println!("{message}");
            }
            if let AuthOutcome::SignedIn { .. } = outcome {
                report(&outcome)?;
            }
        }
        AuthAction::Otp { phone } => {
            let outcome = flow()?.sign_in_with_otp(&phone, Utc::now()).await?;
            report(&outcome)?;
        }
        AuthAction::Verify { phone, code } => {
            let outcome = flow()?.verify_otp(&phone, &code).await?;
            report(&outcome)?;
        }
        AuthAction::SignOut => {
            let token = auth::stored_access_token()?.ok_or(AuthError::NotSignedIn)?;
            let result = flow()?.sign_out(&token).await;
            // The local session goes either way.
            auth::clear_session()?;
            if let Err(e) = &result {
                tracing::warn!("server sign-out failed: {e}");
            }
            println!("signed out");
        }
        AuthAction::Status => match auth::stored_access_token()? {
            Some(_) => println!("signed in"),
            None => println!("signed out"),
        },
    }
    Ok(())
}

pub async fn run(action: AuthAction) -> CmdResult {
    run_inner(action).await.map_err(friendly)
}
