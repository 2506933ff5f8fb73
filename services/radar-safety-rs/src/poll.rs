use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::discovery::select_latest_observation;
use crate::error::{AnalysisError, FetchError, ReportError};
use crate::intensity::clean_intensity;
use crate::proximity::distance_to_nearest_rain;
use crate::rings::max_by_radius;
use crate::types::{
    DerivedMetrics, IntensityField, LatestStatus, RadarFrame, RawRaster, ReferencePoint,
};
use crate::utils::{current_radar_time, format_wire_timestamp};

/// Upstream collaborator providing observation times and rasters.
pub trait RadarSource {
    async fn observation_times(&self) -> Result<Vec<String>, FetchError>;
    async fn fetch_raster(&self, observed_at: DateTime<Utc>) -> Result<RawRaster, FetchError>;
}

/// Downstream consumer of derived metrics.
pub trait MetricsSink {
    async fn report(
        &self,
        metrics: &DerivedMetrics,
        observed_at: DateTime<Utc>,
    ) -> Result<(), ReportError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Processed {
        observed_at: DateTime<Utc>,
        delivered: bool,
    },
    Stale {
        observed_at: DateTime<Utc>,
    },
    FetchFailed,
    ProcessingFailed {
        observed_at: DateTime<Utc>,
    },
}

pub struct PollLoop<S, R> {
    cfg: Arc<Config>,
    source: S,
    sink: R,
    reference: ReferencePoint,
    last_seen: Option<DateTime<Utc>>,
    status: Arc<RwLock<Option<Arc<LatestStatus>>>>,
}

impl<S: RadarSource, R: MetricsSink> PollLoop<S, R> {
    pub fn new(
        cfg: Arc<Config>,
        source: S,
        sink: R,
        status: Arc<RwLock<Option<Arc<LatestStatus>>>>,
    ) -> Self {
        let reference = cfg.reference_point();
        Self {
            cfg,
            source,
            sink,
            reference,
            last_seen: None,
            status,
        }
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Polls until `shutdown` flips to true. Only the sleep between cycles is
    /// interrupted; an in-flight cycle is bounded by the HTTP timeouts.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        info!(
            "Polling radar every {}s (retry {}s) for radii {:?} km",
            self.cfg.poll_interval.as_secs(),
            self.cfg.retry_interval.as_secs(),
            self.cfg.radii_km
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_cycle(Utc::now()).await;
            let delay = self.delay_after(&outcome);
            debug!("Cycle finished with {outcome:?}; sleeping {}s", delay.as_secs());

            tokio::select! {
                _ = sleep(delay) => {}
                _ = wait_for_shutdown(shutdown.clone()) => break,
            }
        }

        info!("Radar polling stopped");
    }

    pub fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Processed {
                delivered: true, ..
            } => self.cfg.poll_interval,
            _ => self.cfg.retry_interval,
        }
    }

    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let target = current_radar_time(now, self.cfg.time_offset_minutes);
        let target_label = format_wire_timestamp(target);

        let observed_at = match self.fetch_latest_time(target).await {
            Ok(observed_at) => observed_at,
            Err(error) => {
                warn!("Radar time lookup failed (target {target_label}): {error:#}");
                return CycleOutcome::FetchFailed;
            }
        };
        let observed_label = format_wire_timestamp(observed_at);
        if observed_at < target {
            debug!("Newest radar frame {observed_label} lags target {target_label}");
        }

        if self.last_seen.is_some_and(|last| observed_at <= last) {
            debug!("No new radar frame since {observed_label}");
            return CycleOutcome::Stale { observed_at };
        }

        let raster = match self.source.fetch_raster(observed_at).await {
            Ok(raster) => raster,
            Err(error) => {
                warn!("Radar fetch for {observed_label} failed: {error:#}");
                return CycleOutcome::FetchFailed;
            }
        };
        let field = match IntensityField::from_raw(&raster) {
            Ok(field) => field,
            Err(error) => {
                warn!("Radar raster for {observed_label} is malformed: {error}");
                return CycleOutcome::FetchFailed;
            }
        };
        self.last_seen = Some(observed_at);

        let metrics = match self.analyze(&field, observed_at) {
            Ok(metrics) => metrics,
            Err(error) => {
                warn!("Radar frame {observed_label} could not be analyzed: {error}");
                return CycleOutcome::ProcessingFailed { observed_at };
            }
        };
        info!(
            "Radar frame {observed_label}: peak {:.2} mm/h, by radius {:?}, nearest rain {}",
            metrics.field_max_mm_h,
            metrics.max_intensity_by_radius,
            metrics
                .rain_distance_km
                .map(|km| format!("{km:.1} km"))
                .unwrap_or_else(|| "none".to_string())
        );

        let delivery = self.sink.report(&metrics, observed_at).await;
        if let Err(error) = &delivery {
            warn!("Report for radar frame {observed_label} failed: {error}");
        }
        let delivered = delivery.is_ok();
        self.publish(&metrics, observed_at, delivery.err()).await;

        CycleOutcome::Processed {
            observed_at,
            delivered,
        }
    }

    async fn fetch_latest_time(
        &self,
        target: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, FetchError> {
        let times = self.source.observation_times().await?;
        select_latest_observation(&times).ok_or_else(|| FetchError::NoObservations {
            target: format_wire_timestamp(target),
        })
    }

    fn analyze(
        &self,
        field: &IntensityField,
        observed_at: DateTime<Utc>,
    ) -> Result<DerivedMetrics, AnalysisError> {
        let frame = RadarFrame::new(
            clean_intensity(field)?,
            self.cfg.meters_per_pixel,
            observed_at,
        )?;
        debug!(
            "Analyzing {}x{} frame {}",
            frame.field.edge(),
            frame.field.edge(),
            format_wire_timestamp(frame.observed_at)
        );

        let max_intensity_by_radius = max_by_radius(
            &frame.field,
            self.reference,
            &self.cfg.radii_km,
            frame.pixel_size_m,
        )?;
        let rain_distance_km =
            distance_to_nearest_rain(&frame.field, self.reference, frame.pixel_size_m)?;

        Ok(DerivedMetrics {
            field_max_mm_h: frame.field.max_value(),
            max_intensity_by_radius,
            rain_distance_km,
        })
    }

    async fn publish(
        &self,
        metrics: &DerivedMetrics,
        observed_at: DateTime<Utc>,
        delivery_error: Option<ReportError>,
    ) {
        let status = LatestStatus {
            timestamp: format_wire_timestamp(observed_at),
            processed_at: format_wire_timestamp(Utc::now()),
            max_intensity_mm_h: metrics
                .max_intensity_by_radius
                .iter()
                .map(|(radius_km, peak)| (format!("{radius_km}km"), *peak))
                .collect(),
            rain_distance_km: metrics.rain_distance_km,
            delivered: delivery_error.is_none(),
            delivery_error: delivery_error.map(|error| error.to_string()),
        };
        *self.status.write().await = Some(Arc::new(status));
    }
}

/// Resolves once shutdown has been requested. A dropped sender never resolves.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}
