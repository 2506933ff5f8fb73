pub const FMI_OPEN_WFS_URL: &str = "https://opendata.fmi.fi/wfs";
pub const FMI_OPEN_WMS_URL: &str = "https://openwms.fmi.fi/geoserver/Radar/wms";
pub const FMI_KEYED_WMS_HOST: &str = "https://wms.fmi.fi/fmi-apikey";
pub const FMI_RADAR_STORED_QUERY: &str = "fmi::radar::composite::rr";
pub const FMI_RADAR_LAYER: &str = "suomi_rr_eureffin";
pub const FMI_RADAR_CRS: &str = "EPSG:3067";

// Komakallio observatory, EPSG:3067.
pub const DEFAULT_SITE_X: f64 = 355_121.064967;
pub const DEFAULT_SITE_Y: f64 = 6_673_513.77179;
pub const DEFAULT_BBOX_SIZE_METERS: f64 = 300_000.0;
pub const DEFAULT_METERS_PER_PIXEL: f64 = 1000.0;
pub const DEFAULT_RADII_KM: &str = "50,30,10,3,1";

pub const RADAR_STEP_SECONDS: i64 = 300;
pub const RAW_COUNTS_PER_MM_H: f64 = 100.0;
pub const MEDIAN_WINDOW: usize = 3;
pub const HOT_PIXEL_SIGMA: f64 = 5.0;
pub const MIN_INTENSITY_MM_H: f64 = 0.2;

pub const REPORT_TYPE: &str = "Radar";
pub const RAIN_DISTANCE_KEY: &str = "rain_distance";

pub const DEFAULT_TIME_OFFSET_MINUTES: u64 = 0;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_RETRY_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_REPORT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_IMAGE_PATH: &str = "latest_rain_intensity.png";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9292";
