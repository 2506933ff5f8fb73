use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;

use crate::constants::FMI_RADAR_STORED_QUERY;
use crate::http_client::fetch_text;
use crate::utils::parse_wire_timestamp;

pub async fn find_radar_observation_times(http: &Client, wfs_url: &str) -> Result<Vec<String>> {
    let url = format!(
        "{wfs_url}?request=GetFeature&storedquery_id={}",
        urlencoding::encode(FMI_RADAR_STORED_QUERY)
    );
    let xml = fetch_text(http, &url).await?;
    parse_result_times(&xml)
}

/// Extracts every `gml:timePosition` nested in an `om:resultTime`, in document order.
/// Self-closing `om:resultTime` references carry no time of their own and are skipped.
pub fn parse_result_times(xml: &str) -> Result<Vec<String>> {
    let element = Regex::new(r"(?s)<om:resultTime(?:\s[^>]*[^/])?>(.*?)</om:resultTime>")
        .context("Failed to compile resultTime regex")?;
    let position =
        Regex::new(r"<gml:timePosition\b[^>]*>\s*([^<]+?)\s*</gml:timePosition>")
            .context("Failed to compile timePosition regex")?;

    Ok(element
        .captures_iter(xml)
        .filter_map(|captures| captures.get(1))
        .flat_map(|body| position.captures_iter(body.as_str()))
        .filter_map(|captures| captures.get(1).map(|value| value.as_str().to_string()))
        .collect())
}

/// Newest parseable observation time in the listing.
pub fn select_latest_observation(times: &[String]) -> Option<DateTime<Utc>> {
    times
        .iter()
        .filter_map(|value| parse_wire_timestamp(value))
        .max()
}
