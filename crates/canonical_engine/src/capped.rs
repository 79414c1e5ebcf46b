use canonical_core::{FetchFailure, FetchOutcome, NormalizedUrl};
use tokio::sync::Semaphore;

use crate::Fetcher;

const BUFFER_UNIT: u64 = 1024;

/// Limits for the cooperative scheduler.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Fetches outstanding at once.
    pub max_clients: usize,
    /// Response buffering reserved across all outstanding fetches.
    pub max_buffer_bytes: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            max_clients: 10,
            max_buffer_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Wraps a fetcher so a single runtime can host many resolutions while
/// holding to a client count and a buffering ceiling.
///
/// Every fetch reserves room for a full body before it starts.
pub struct CappedFetcher<F> {
    inner: F,
    clients: Semaphore,
    buffer: Semaphore,
    max_clients: usize,
    reservation: u32,
}

impl<F: Fetcher> CappedFetcher<F> {
    pub fn new(inner: F, settings: &GateSettings, max_body_bytes: u64) -> Self {
        let max_clients = settings.max_clients.clamp(1, Semaphore::MAX_PERMITS);
        let buffer_units = usize::try_from(units(settings.max_buffer_bytes))
            .unwrap_or(Semaphore::MAX_PERMITS)
            .clamp(1, Semaphore::MAX_PERMITS);
        let reservation = usize::try_from(units(max_body_bytes))
            .unwrap_or(usize::MAX)
            .clamp(1, buffer_units);
        Self {
            inner,
            clients: Semaphore::new(max_clients),
            buffer: Semaphore::new(buffer_units),
            max_clients,
            reservation: u32::try_from(reservation).unwrap_or(u32::MAX),
        }
    }

    /// Fetches holding a client slot right now.
    pub fn in_flight(&self) -> usize {
        self.max_clients - self.clients.available_permits()
    }
}

fn units(bytes: u64) -> u64 {
    bytes.div_ceil(BUFFER_UNIT)
}

#[async_trait::async_trait]
impl<F: Fetcher> Fetcher for CappedFetcher<F> {
    async fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome {
        let Ok(_client) = self.clients.acquire().await else {
            return FetchOutcome::failed(FetchFailure::Download, None);
        };
        let Ok(_buffer) = self.buffer.acquire_many(self.reservation).await else {
            return FetchOutcome::failed(FetchFailure::Download, None);
        };
        self.inner.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    #[async_trait::async_trait]
    impl Fetcher for Unreachable {
        async fn fetch(&self, _url: &NormalizedUrl) -> FetchOutcome {
            FetchOutcome::default()
        }
    }

    #[test]
    fn reservation_never_exceeds_the_buffer_ceiling() {
        let settings = GateSettings {
            max_clients: 4,
            max_buffer_bytes: 4096,
        };
        let capped = CappedFetcher::new(Unreachable, &settings, 1024 * 1024);
        assert_eq!(capped.reservation, 4);
        assert_eq!(capped.in_flight(), 0);
    }

    #[test]
    fn partial_units_round_up() {
        assert_eq!(units(1), 1);
        assert_eq!(units(1024), 1);
        assert_eq!(units(1025), 2);
        assert_eq!(units(0), 0);
    }
}
