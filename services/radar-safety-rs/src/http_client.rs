use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};

async fn get_ok(http: &Client, url: &str) -> Result<Response> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Upstream request failed for {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Upstream returned {status} for {url}");
    }
    Ok(response)
}

pub async fn fetch_bytes(http: &Client, url: &str) -> Result<Vec<u8>> {
    let body = get_ok(http, url)
        .await?
        .bytes()
        .await
        .with_context(|| format!("Failed to read raster body from {url}"))?;
    Ok(body.to_vec())
}

pub async fn fetch_text(http: &Client, url: &str) -> Result<String> {
    get_ok(http, url)
        .await?
        .text()
        .await
        .with_context(|| format!("Failed to read text body from {url}"))
}
