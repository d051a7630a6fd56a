//! Session management commands.

use anyhow::Result;
use dialoguer::Confirm;
use serde_json::json;
use turbo_auth::redact;
use turbo_client::{CredentialStore, Credentials};

use super::{SessionArgs, SessionCommand};
use crate::context::Context;
use crate::store::SessionFile;

/// Run the session command.
pub async fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    match args.command {
        SessionCommand::Show => show_session(ctx),
        SessionCommand::Set {
            access_token,
            refresh_token,
        } => set_session(&access_token, &refresh_token, ctx),
        SessionCommand::Clear { yes } => clear_session(yes, ctx),
    }
}

fn show_session(ctx: &Context) -> Result<()> {
    let path = ctx.session_path();
    let session = SessionFile::read(&path)?;

    if ctx.output.is_json() {
        ctx.output.json(&match &session {
            Some(file) => json!({
                "status": "authenticated",
                "file": path.display().to_string(),
                "accessToken": redact(&file.credentials.access_token),
                "refreshToken": redact(&file.credentials.refresh_token),
                "savedAt": file.saved_at.to_rfc3339(),
            }),
            None => json!({
                "status": "signed_out",
                "file": path.display().to_string(),
            }),
        });
        return Ok(());
    }

    ctx.output.header("Session");
    ctx.output.kv("file", &path.display().to_string());

    match session {
        Some(file) => {
            ctx.output.kv("status", "authenticated");
            ctx.output
                .kv("access token", &redact(&file.credentials.access_token));
            ctx.output
                .kv("refresh token", &redact(&file.credentials.refresh_token));
            ctx.output.kv(
                "saved at",
                &file.saved_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }
        None => ctx.output.kv("status", "signed out"),
    }

    Ok(())
}

fn set_session(access_token: &str, refresh_token: &str, ctx: &Context) -> Result<()> {
    let credentials = Credentials::new(access_token, refresh_token)?;
    let store = ctx.session_store()?;
    store.set_credentials(credentials);

    if ctx.output.is_json() {
        ctx.output.json(&json!({ "status": "authenticated" }));
    } else {
        ctx.output
            .success(&format!("Session saved to {}", store.path().display()));
    }

    Ok(())
}

fn clear_session(yes: bool, ctx: &Context) -> Result<()> {
    let store = ctx.session_store()?;

    if store.credentials().is_none() {
        ctx.output.info("No session stored.");
        return Ok(());
    }

    if !yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt("Sign out and delete the stored session?")
            .default(false)
            .interact()?;
        if !confirmed {
            ctx.output.info("Cancelled.");
            return Ok(());
        }
    }

    store.clear_credentials();

    if ctx.output.is_json() {
        ctx.output.json(&json!({ "status": "signed_out" }));
    } else {
        ctx.output.success("Signed out");
    }

    Ok(())
}
