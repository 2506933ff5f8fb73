use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BBOX_SIZE_METERS, DEFAULT_IMAGE_PATH, DEFAULT_LISTEN_ADDR, DEFAULT_METERS_PER_PIXEL,
    DEFAULT_POLL_INTERVAL_SECONDS, DEFAULT_RADII_KM, DEFAULT_REPORT_TIMEOUT_SECONDS,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_RETRY_INTERVAL_SECONDS, DEFAULT_SITE_X,
    DEFAULT_SITE_Y, DEFAULT_TIME_OFFSET_MINUTES, FMI_KEYED_WMS_HOST, FMI_OPEN_WFS_URL,
    FMI_OPEN_WMS_URL, FMI_RADAR_LAYER,
};
use crate::error::ConfigError;
use crate::types::{BoundingBox, ReferencePoint};

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: String,
    pub report_url: String,
    pub api_key: Option<String>,
    pub wfs_url: String,
    pub wms_url: String,
    pub wms_layer: String,
    pub site_x: f64,
    pub site_y: f64,
    pub bbox_size_meters: f64,
    pub meters_per_pixel: f64,
    pub radii_km: Vec<u32>,
    pub time_offset_minutes: u64,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub report_timeout: Duration,
    pub image_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Blank values count
    /// as unset.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let report_url = env("RADAR_REPORT_URL").ok_or(ConfigError::Missing {
            name: "RADAR_REPORT_URL",
        })?;
        let api_key = env("RADAR_API_KEY");
        let wfs_url =
            trim_base_url(&env("RADAR_WFS_URL").unwrap_or_else(|| FMI_OPEN_WFS_URL.into()));
        let wms_url = trim_base_url(&env("RADAR_WMS_URL").unwrap_or_else(|| match &api_key {
            Some(key) => format!(
                "{FMI_KEYED_WMS_HOST}/{}/geoserver/Radar/wms",
                urlencoding::encode(key)
            ),
            None => FMI_OPEN_WMS_URL.to_string(),
        }));
        let wms_layer = env("RADAR_WMS_LAYER").unwrap_or_else(|| FMI_RADAR_LAYER.to_string());

        let site_x = env_f64(&env, "RADAR_SITE_X", DEFAULT_SITE_X)?;
        let site_y = env_f64(&env, "RADAR_SITE_Y", DEFAULT_SITE_Y)?;
        let bbox_size_meters =
            env_positive_f64(&env, "RADAR_BBOX_SIZE_METERS", DEFAULT_BBOX_SIZE_METERS)?;
        let meters_per_pixel =
            env_positive_f64(&env, "RADAR_METERS_PER_PIXEL", DEFAULT_METERS_PER_PIXEL)?;
        if bbox_size_meters < meters_per_pixel {
            return Err(ConfigError::Invalid {
                name: "RADAR_BBOX_SIZE_METERS",
                value: bbox_size_meters.to_string(),
                reason: format!("must cover at least one {meters_per_pixel} m pixel"),
            });
        }

        let radii_raw = env("RADAR_RADII_KM").unwrap_or_else(|| DEFAULT_RADII_KM.to_string());
        let radii_km = parse_radii(&radii_raw)?;

        let time_offset_minutes =
            env_u64(&env, "RADAR_TIME_OFFSET_MINUTES", DEFAULT_TIME_OFFSET_MINUTES)?;
        let poll_interval = Duration::from_secs(env_u64(
            &env,
            "RADAR_POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?);
        let retry_interval = Duration::from_secs(env_u64(
            &env,
            "RADAR_RETRY_INTERVAL_SECONDS",
            DEFAULT_RETRY_INTERVAL_SECONDS,
        )?);
        let request_timeout = Duration::from_secs(env_u64(
            &env,
            "RADAR_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?);
        let report_timeout = Duration::from_secs(env_u64(
            &env,
            "RADAR_REPORT_TIMEOUT_SECONDS",
            DEFAULT_REPORT_TIMEOUT_SECONDS,
        )?);

        let image_path = PathBuf::from(
            env("RADAR_IMAGE_PATH").unwrap_or_else(|| DEFAULT_IMAGE_PATH.to_string()),
        );
        let listen_addr =
            env("RADAR_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        Ok(Self {
            listen_addr,
            report_url,
            api_key,
            wfs_url,
            wms_url,
            wms_layer,
            site_x,
            site_y,
            bbox_size_meters,
            meters_per_pixel,
            radii_km,
            time_offset_minutes,
            poll_interval,
            retry_interval,
            request_timeout,
            report_timeout,
            image_path,
        })
    }

    pub fn image_edge_pixels(&self) -> usize {
        (self.bbox_size_meters / self.meters_per_pixel) as usize
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::centered(self.site_x, self.site_y, self.bbox_size_meters)
    }

    /// The bounding box is centred on the site, so the site projects onto the raster centre.
    pub fn reference_point(&self) -> ReferencePoint {
        ReferencePoint::center(self.image_edge_pixels())
    }
}

fn parse_radii(raw: &str) -> Result<Vec<u32>, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "RADAR_RADII_KM",
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let mut radii = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let radius = entry
            .parse::<u32>()
            .map_err(|_| invalid("expected comma-separated whole kilometres"))?;
        if radius == 0 {
            return Err(invalid("radii must be positive"));
        }
        if !radii.contains(&radius) {
            radii.push(radius);
        }
    }

    if radii.is_empty() {
        return Err(invalid("at least one radius is required"));
    }
    Ok(radii)
}

fn trim_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

fn env_u64<F>(env: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env(name) {
        Some(value) => value.parse::<u64>().map_err(|error| ConfigError::Invalid {
            name,
            value,
            reason: error.to_string(),
        }),
        None => Ok(default),
    }
}

fn env_f64<F>(env: &F, name: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env(name) {
        Some(value) => match value.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            Ok(_) => Err(ConfigError::Invalid {
                name,
                value,
                reason: "must be finite".to_string(),
            }),
            Err(error) => Err(ConfigError::Invalid {
                name,
                value,
                reason: error.to_string(),
            }),
        },
        None => Ok(default),
    }
}

fn env_positive_f64<F>(env: &F, name: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = env_f64(env, name, default)?;
    if value <= 0.0 {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_source(|name| vars.get(name).cloned())
    }

    #[test]
    fn missing_report_url_is_fatal() {
        let error = config_from(&[]).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Missing {
                name: "RADAR_REPORT_URL"
            }
        ));
    }

    #[test]
    fn defaults_describe_the_komakallio_grid() {
        let cfg = config_from(&[("RADAR_REPORT_URL", "http://127.0.0.1:8080/report")]).unwrap();
        assert_eq!(cfg.radii_km, vec![50, 30, 10, 3, 1]);
        assert_eq!(cfg.image_edge_pixels(), 300);
        assert_eq!(cfg.reference_point(), ReferencePoint { row: 150, col: 150 });
        assert_eq!(cfg.poll_interval, Duration::from_secs(300));
        assert_eq!(cfg.retry_interval, Duration::from_secs(60));
        assert_eq!(cfg.report_timeout, Duration::from_secs(5));
        assert_eq!(cfg.wms_url, FMI_OPEN_WMS_URL);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn api_key_selects_keyed_wms_host() {
        let cfg = config_from(&[
            ("RADAR_REPORT_URL", "http://sink/report"),
            ("RADAR_API_KEY", "abc-123"),
        ])
        .unwrap();
        assert_eq!(
            cfg.wms_url,
            "https://wms.fmi.fi/fmi-apikey/abc-123/geoserver/Radar/wms"
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config_from(&[
            ("RADAR_REPORT_URL", "http://sink/report"),
            ("RADAR_RETRY_INTERVAL_SECONDS", "   "),
            ("RADAR_WFS_URL", "https://example.test/wfs/"),
        ])
        .unwrap();
        assert_eq!(cfg.retry_interval, Duration::from_secs(60));
        assert_eq!(cfg.wfs_url, "https://example.test/wfs");
    }

    #[test]
    fn rejects_malformed_numbers_and_radii() {
        let error = config_from(&[
            ("RADAR_REPORT_URL", "http://sink/report"),
            ("RADAR_POLL_INTERVAL_SECONDS", "five"),
        ])
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "RADAR_POLL_INTERVAL_SECONDS",
                ..
            }
        ));

        for radii in ["0,10", "ten", ","] {
            let error = config_from(&[
                ("RADAR_REPORT_URL", "http://sink/report"),
                ("RADAR_RADII_KM", radii),
            ])
            .unwrap_err();
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "RADAR_RADII_KM",
                    ..
                }
            ));
        }

        let error = config_from(&[
            ("RADAR_REPORT_URL", "http://sink/report"),
            ("RADAR_METERS_PER_PIXEL", "-1"),
        ])
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "RADAR_METERS_PER_PIXEL",
                ..
            }
        ));
    }

    #[test]
    fn custom_radii_keep_order_and_drop_duplicates() {
        let cfg = config_from(&[
            ("RADAR_REPORT_URL", "http://sink/report"),
            ("RADAR_RADII_KM", " 5, 20 ,5"),
        ])
        .unwrap();
        assert_eq!(cfg.radii_km, vec![5, 20]);
    }
}
