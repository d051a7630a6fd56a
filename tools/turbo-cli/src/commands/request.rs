//! Send a request through the authenticated pipeline.

use anyhow::{bail, Context as _, Result};
use serde_json::{json, Value};
use turbo_client::{ApiError, Method, PendingRequest};

use super::RequestArgs;
use crate::context::Context;
use crate::output::status_badge;

/// Run the request command.
pub async fn run(args: RequestArgs, ctx: &Context) -> Result<()> {
    let method: Method = args.method.parse()?;
    let pipeline = ctx.pipeline()?;

    let mut request = pipeline.request(method, &args.path);
    for header in &args.headers {
        let (name, value) = parse_header(header)?;
        request = request.header(name, value);
    }
    for param in &args.query {
        let (key, value) = parse_query(param)?;
        request = request.query(key, value);
    }
    if let Some(ref data) = args.data {
        request = with_json_body(request, data)?;
    }

    ctx.output
        .debug(&format!("{} {}", request.method, request.url));

    let spinner = ctx.output.spinner(&format!("{} {}", method, args.path));
    let result = pipeline.execute(request).await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            let payload = response.payload().unwrap_or(Value::Null);
            if ctx.output.is_json() {
                ctx.output
                    .json(&json!({ "status": response.status, "body": payload }));
                return Ok(());
            }

            ctx.output.success(&status_badge(response.status));
            ctx.output.body(&render_payload(&payload));
            Ok(())
        }
        Err(err) => {
            if ctx.output.is_json() {
                ctx.output
                    .json(&json!({ "status": err.status(), "error": err.payload() }));
            }
            report_failure(&err, ctx)
        }
    }
}

fn report_failure(err: &ApiError, ctx: &Context) -> Result<()> {
    match err {
        ApiError::SessionExpired => {
            ctx.output
                .warn("Run `turbo session set` with fresh tokens to sign in again.");
            bail!("{}", err)
        }
        ApiError::Http { status, payload } => {
            if !ctx.output.is_json() {
                ctx.output.body(&render_payload(payload));
            }
            bail!("Request failed with status {}", status)
        }
        ApiError::Transport { .. } | ApiError::Decode(_) => bail!("{}", err),
    }
}

fn with_json_body(request: PendingRequest, data: &str) -> Result<PendingRequest> {
    let body: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
    Ok(request.json(&body)?)
}

/// Parse `Name: value`.
fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("Invalid header '{}', expected 'Name: value'", raw),
    }
}

/// Parse `key=value`.
fn parse_query(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Invalid query parameter '{}', expected 'key=value'", raw),
    }
}

fn render_payload(payload: &Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
