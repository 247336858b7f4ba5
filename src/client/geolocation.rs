//! Position sources for the location reporter.

use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use thiserror::Error;

use crate::protocol::LocationSample;

/// Settings a platform position watch is opened with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchOptions {
    pub enable_high_accuracy: bool,
    /// Give up on a single fix after this long.
    pub timeout: Duration,
    /// Oldest cached fix the platform may hand back. Zero forces a fresh one.
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timeout expired")]
    Timeout,
}

/// A continuous position watch. Dropping it cancels the subscription.
pub type PositionWatch = BoxStream<'static, Result<LocationSample, PositionError>>;

/// A platform that can report the device position.
pub trait Geolocation: Send + Sync {
    fn watch_position(&self, options: &WatchOptions) -> PositionWatch;
}

/// Replays a fixed script of fixes and failures, then ends the watch.
#[derive(Clone, Debug, Default)]
pub struct StaticGeolocation {
    fixes: Vec<Result<LocationSample, PositionError>>,
    interval: Option<Duration>,
}

impl StaticGeolocation {
    pub fn new(fixes: Vec<Result<LocationSample, PositionError>>) -> Self {
        Self {
            fixes,
            interval: None,
        }
    }

    pub fn from_samples(samples: impl IntoIterator<Item = LocationSample>) -> Self {
        Self::new(samples.into_iter().map(Ok).collect())
    }

    /// Wait `interval` before delivering each fix.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

impl Geolocation for StaticGeolocation {
    fn watch_position(&self, _options: &WatchOptions) -> PositionWatch {
        let fixes = stream::iter(self.fixes.clone());
        match self.interval {
            None => fixes.boxed(),
            Some(pause) => fixes
                .then(move |fix| async move {
                    tokio::time::sleep(pause).await;
                    fix
                })
                .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_demand_fresh_accurate_fixes() {
        let options = WatchOptions::default();
        assert!(options.enable_high_accuracy);
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.maximum_age, Duration::ZERO);
    }

    #[tokio::test]
    async fn static_source_replays_script_in_order() {
        let geo = StaticGeolocation::new(vec![
            Ok(LocationSample::new(1.0, 2.0)),
            Err(PositionError::Timeout),
            Ok(LocationSample::new(3.0, 4.0)),
        ]);
        let fixes: Vec<_> = geo.watch_position(&WatchOptions::default()).collect().await;
        assert_eq!(
            fixes,
            vec![
                Ok(LocationSample::new(1.0, 2.0)),
                Err(PositionError::Timeout),
                Ok(LocationSample::new(3.0, 4.0)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interval_spaces_out_fixes() {
        let geo = StaticGeolocation::from_samples([LocationSample::new(1.0, 1.0)])
            .with_interval(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        let fixes: Vec<_> = geo.watch_position(&WatchOptions::default()).collect().await;
        assert_eq!(fixes.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn each_watch_starts_from_the_top() {
        let geo = StaticGeolocation::from_samples([LocationSample::new(5.0, 6.0)]);
        let first: Vec<_> = geo.watch_position(&WatchOptions::default()).collect().await;
        let second: Vec<_> = geo.watch_position(&WatchOptions::default()).collect().await;
        assert_eq!(first, second);
    }
}
