//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, DEFAULT_BASE_URL};
use crate::context::{config_file_in, Context};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { base_url, force } => init_config(base_url.as_deref(), force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Current Configuration");

    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    match ctx.config_path {
        Some(ref path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults, no config file found)"),
    }

    let client = &ctx.config.client;
    ctx.output.info("");
    ctx.output.info("[client]");
    ctx.output.kv("base_url", &client.base_url);
    ctx.output.kv("refresh_path", &client.refresh_path);
    ctx.output
        .kv("request_timeout_secs", &client.request_timeout_secs.to_string());
    ctx.output
        .kv("refresh_timeout_secs", &client.refresh_timeout_secs.to_string());
    if let Some(ref agent) = client.user_agent {
        ctx.output.kv("user_agent", agent);
    }

    if !client.default_headers.is_empty() {
        ctx.output.info("");
        ctx.output.info("[client.default_headers]");
        let mut headers: Vec<_> = client.default_headers.iter().collect();
        headers.sort();
        for (key, value) in headers {
            ctx.output.kv(key, value);
        }
    }

    ctx.output.info("");
    ctx.output.info("[session]");
    ctx.output.kv("file", &ctx.session_path().display().to_string());

    Ok(())
}

fn init_config(base_url: Option<&str>, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("turbo.toml");

    if let Some(existing) = config_file_in(&ctx.cwd) {
        if !force {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                existing.display()
            );
        }
    }

    let content = generate_default_config(base_url.unwrap_or(DEFAULT_BASE_URL));
    fs::write(&config_path, content)?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = check(ctx);

    // Print results
    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Collect configuration errors and warnings.
fn check(ctx: &Context) -> (Vec<String>, Vec<String>) {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let client = &ctx.config.client;

    if let Err(e) = client.validate() {
        errors.push(e.to_string());
    }

    if ctx.config_path.is_none() {
        warnings.push("no config file found; using defaults".to_string());
    }

    // Tokens travel in headers on every call.
    if client.base_url.starts_with("http://")
        && !client.base_url.starts_with("http://localhost")
        && !client.base_url.starts_with("http://127.0.0.1")
    {
        warnings.push(format!(
            "client.base_url '{}' is not HTTPS; tokens would be sent in clear text",
            client.base_url
        ));
    }

    if client.refresh_timeout_secs > client.request_timeout_secs {
        warnings.push(
            "client.refresh_timeout_secs exceeds request_timeout_secs; the transport timeout applies first"
                .to_string(),
        );
    }

    if client
        .default_headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("authorization"))
    {
        warnings.push(
            "client.default_headers contains Authorization; it is sent only while signed out, \
             replaced by the session token otherwise and never sent to the refresh endpoint"
                .to_string(),
        );
    }

    if ctx.config.session.file.trim().is_empty() {
        errors.push("session.file must not be empty".to_string());
    }

    (errors, warnings)
}
