// Client module - blocking calls against a running NoteVault server

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::path::Path;

/// Joins a server base URL and an API path.
pub fn endpoint(server: &str, path: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), path)
}

/// Pulls the `message` out of an error body, falling back to the status line.
fn failure(status: u16, body: Option<Value>) -> anyhow::Error {
    let message = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status));
    anyhow!("Server returned {}: {}", status, message)
}

fn send_error(err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(status, response) => failure(status, response.into_json().ok()),
        ureq::Error::Transport(t) => anyhow!("Request failed: {}", t),
    }
}

/// GET /api/health
pub fn health(server: &str) -> Result<Value> {
    ureq::get(&endpoint(server, "/api/health"))
        .call()
        .map_err(send_error)?
        .into_json()
        .context("Health response is not JSON")
}

/// POST /api/admin/login, returning the session token.
pub fn login(server: &str, username: &str, password: &str) -> Result<String> {
    let body: Value = ureq::post(&endpoint(server, "/api/admin/login"))
        .send_json(json!({ "username": username, "password": password }))
        .map_err(send_error)?
        .into_json()
        .context("Login response is not JSON")?;

    body.get("token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Login response did not include a token"))
}

/// GET /api/admin/orders/csv, written to `output`. Returns the number of data rows.
pub fn export_orders(server: &str, token: &str, output: &Path) -> Result<usize> {
    let csv = ureq::get(&endpoint(server, "/api/admin/orders/csv"))
        .set("Authorization", &format!("Bearer {}", token))
        .call()
        .map_err(send_error)?
        .into_string()
        .context("Failed to read CSV body")?;

    std::fs::write(output, &csv)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;

    Ok(data_rows(&csv))
}

/// Rows after the header line.
pub fn data_rows(csv: &str) -> usize {
    csv.lines().skip(1).filter(|l| !l.trim().is_empty()).count()
}
