use std::io::Cursor;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::FMI_RADAR_CRS;
use crate::discovery::find_radar_observation_times;
use crate::error::{FetchError, InvalidRasterError};
use crate::http_client::fetch_bytes;
use crate::poll::RadarSource;
use crate::storage::persist_latest_image;
use crate::types::{BoundingBox, RawRaster};
use crate::utils::format_wire_timestamp;

/// FMI open-data collaborator: WFS for observation times, WMS GetMap for rasters.
pub struct FmiRadarSource {
    cfg: Arc<Config>,
    http: Client,
}

impl FmiRadarSource {
    pub fn new(cfg: Arc<Config>, http: Client) -> Self {
        Self { cfg, http }
    }
}

impl RadarSource for FmiRadarSource {
    async fn observation_times(&self) -> Result<Vec<String>, FetchError> {
        Ok(find_radar_observation_times(&self.http, &self.cfg.wfs_url).await?)
    }

    async fn fetch_raster(&self, observed_at: DateTime<Utc>) -> Result<RawRaster, FetchError> {
        let timestamp = format_wire_timestamp(observed_at);
        let edge = self.cfg.image_edge_pixels();
        let url = build_get_map_url(
            &self.cfg.wms_url,
            &self.cfg.wms_layer,
            &self.cfg.bounding_box(),
            edge,
            &timestamp,
        );
        debug!("Fetching radar image for {timestamp}");

        let encoded = fetch_bytes(&self.http, &url).await?;
        let decode_input = encoded.clone();
        let decode_timestamp = timestamp.clone();
        let raster =
            tokio::task::spawn_blocking(move || decode_raster(&decode_input, &decode_timestamp))
                .await
                .context("Join error while decoding radar PNG")??;

        if raster.edge != edge {
            return Err(InvalidRasterError {
                timestamp,
                reason: format!("expected {edge}x{edge} pixels, got {0}x{0}", raster.edge),
            }
            .into());
        }

        if let Err(error) = persist_latest_image(&self.cfg.image_path, &encoded).await {
            warn!("Failed to save radar image for {timestamp}: {error:#}");
        }

        Ok(raster)
    }
}

pub fn build_get_map_url(
    wms_url: &str,
    layer: &str,
    bbox: &BoundingBox,
    edge: usize,
    timestamp: &str,
) -> String {
    let edge = edge.to_string();
    let bbox = bbox.to_query_value();
    let params = [
        ("service", "WMS"),
        ("version", "1.3.0"),
        ("request", "GetMap"),
        ("layers", layer),
        ("crs", FMI_RADAR_CRS),
        ("bbox", bbox.as_str()),
        ("styles", "raster"),
        ("width", edge.as_str()),
        ("height", edge.as_str()),
        ("format", "image/png"),
        ("time", timestamp),
    ];
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{wms_url}?{query}")
}

/// Decodes a square single-channel PNG into raw counts. Colour, palette and sub-byte
/// images are rejected since their samples are not radar counts.
pub fn decode_raster(encoded: &[u8], timestamp: &str) -> Result<RawRaster, InvalidRasterError> {
    let invalid = |reason: String| InvalidRasterError {
        timestamp: timestamp.to_string(),
        reason,
    };

    let decoder = png::Decoder::new(Cursor::new(encoded));
    let mut reader = decoder
        .read_info()
        .map_err(|error| invalid(format!("PNG header: {error}")))?;
    let mut decoded = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut decoded)
        .map_err(|error| invalid(format!("PNG data: {error}")))?;
    let data = &decoded[..info.buffer_size()];

    if info.width != info.height || info.width == 0 {
        return Err(invalid(format!(
            "expected a square raster, got {}x{}",
            info.width, info.height
        )));
    }
    if !matches!(info.color_type, png::ColorType::Grayscale) {
        return Err(invalid(format!(
            "expected single-channel grayscale, got {:?}",
            info.color_type
        )));
    }

    let counts = match info.bit_depth {
        png::BitDepth::Eight => data.iter().map(|value| *value as u16).collect::<Vec<_>>(),
        png::BitDepth::Sixteen => data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
        other => return Err(invalid(format!("unsupported bit depth {other:?}"))),
    };

    let edge = info.width as usize;
    if counts.len() != edge * edge {
        return Err(invalid(format!(
            "expected {} samples, decoded {}",
            edge * edge,
            counts.len()
        )));
    }

    Ok(RawRaster { edge, counts })
}
