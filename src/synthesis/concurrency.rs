/*!
 * Provider-specific concurrency tuning.
 *
 * Each provider gets a recommended worker count and a hard ceiling that
 * user settings cannot exceed. Providers with a published request rate
 * also get a pacer that spaces call starts evenly across workers.
 */

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::app_config::SynthesisProvider;

/// Concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Workers used when nothing is configured
    pub recommended_workers: usize,
    /// Upper bound for configured workers
    pub max_workers: usize,
    /// Requests per minute the provider tolerates, if it publishes a limit
    pub target_rpm: Option<u32>,
}

impl ProviderProfile {
    /// Get the profile for a given provider
    pub fn for_provider(provider: &SynthesisProvider) -> Self {
        match provider {
            SynthesisProvider::OpenAI => Self {
                // speech endpoints throttle well below chat endpoints
                recommended_workers: 4,
                max_workers: 16,
                target_rpm: Some(50),
            },
            SynthesisProvider::Mock => Self {
                recommended_workers: 8,
                max_workers: 64,
                target_rpm: None,
            },
        }
    }

    /// Worker count after applying an optional user override
    pub fn effective_workers(&self, user_override: Option<usize>) -> usize {
        user_override
            .filter(|workers| *workers > 0)
            .unwrap_or(self.recommended_workers)
            .clamp(1, self.max_workers)
    }

    /// Minimum spacing between call starts, from the requests-per-minute limit
    pub fn request_interval(&self) -> Option<Duration> {
        self.target_rpm
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_millis(60_000 / u64::from(rpm)))
    }
}

/// Hands out call start times at least `interval` apart
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next_slot: Mutex::new(None) }
    }

    /// Wait for this caller's slot; the first call starts immediately
    pub async fn wait(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.map_or(now, |next| next.max(now));
            *next_slot = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
