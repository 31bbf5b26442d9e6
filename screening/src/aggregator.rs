use crate::provider::ProviderAdapter;
use crate::types::{ScreeningResult, ScreeningSubject};
use futures_util::future::join_all;
use tracing::{info, warn};

/// Fans a screening out to every configured provider and merges the results.
///
/// All providers run concurrently; merging happens after every call has
/// returned or timed out, in configured order, so the merged result does not
/// depend on completion order.
pub struct ScreeningAggregator {
    adapters: Vec<ProviderAdapter>,
}

impl ScreeningAggregator {
    pub fn new(adapters: Vec<ProviderAdapter>) -> Self {
        Self { adapters }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub async fn screen_individual(&self, subject: &ScreeningSubject) -> ScreeningResult {
        let results = join_all(self.adapters.iter().map(|a| a.screen_individual(subject))).await;
        let merged = Self::merge(results);
        Self::log_outcome(subject.name().unwrap_or_default(), &merged);
        merged
    }

    pub async fn screen_address(&self, address: &str, chain: &str) -> ScreeningResult {
        let results =
            join_all(self.adapters.iter().map(|a| a.screen_address(address, chain))).await;
        let merged = Self::merge(results);
        Self::log_outcome(address, &merged);
        merged
    }

    pub async fn screen(&self, subject: &ScreeningSubject) -> ScreeningResult {
        let results = join_all(self.adapters.iter().map(|a| a.screen(subject))).await;
        let merged = Self::merge(results);
        let label = subject
            .name()
            .or_else(|| subject.address_value())
            .unwrap_or_default();
        Self::log_outcome(label, &merged);
        merged
    }

    fn merge(results: Vec<ScreeningResult>) -> ScreeningResult {
        results
            .into_iter()
            .fold(ScreeningResult::empty(), |mut acc, result| {
                acc.merge(result);
                acc
            })
    }

    fn log_outcome(label: &str, result: &ScreeningResult) {
        if result.is_clear() {
            info!(
                providers = result.providers_checked().len(),
                "Screening clear for {}", label
            );
        } else {
            warn!(
                providers = result.providers_checked().len(),
                matches = result.total_matches(),
                "Screening matches for {}", label
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{FakeProvider, RecordingAuditSink};
    use std::sync::Arc;
    use std::time::Duration;

    fn aggregator(providers: Vec<Arc<FakeProvider>>) -> ScreeningAggregator {
        let audit = Arc::new(RecordingAuditSink::default());
        ScreeningAggregator::new(
            providers
                .into_iter()
                .map(|p| ProviderAdapter::new(p, Duration::from_millis(500), audit.clone()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_hide_others() {
        let good = Arc::new(FakeProvider::returning("alpha", vec!["John Doe"]));
        let bad = Arc::new(FakeProvider::failing("beta"));
        let other = Arc::new(FakeProvider::returning("gamma", vec!["John Doe", "Johnny Doe"]));
        let aggregator = aggregator(vec![good, bad, other]);

        let result = aggregator
            .screen_individual(&ScreeningSubject::individual("John Doe"))
            .await;

        assert_eq!(result.total_matches(), 3);
        assert_eq!(result.providers_checked().len(), 3);
        assert!(result.providers_checked().contains("beta"));
        assert!(result.matches_by_provider()["beta"].is_empty());
        assert_eq!(result.matches_by_provider()["gamma"].len(), 2);
    }

    #[tokio::test]
    async fn test_empty_name_calls_nobody() {
        let alpha = Arc::new(FakeProvider::returning("alpha", vec!["John Doe"]));
        let beta = Arc::new(FakeProvider::returning("beta", vec!["John Doe"]));
        let aggregator = aggregator(vec![alpha.clone(), beta.clone()]);

        let result = aggregator
            .screen_individual(&ScreeningSubject::individual(""))
            .await;

        assert_eq!(alpha.call_count() + beta.call_count(), 0);
        assert_eq!(result.total_matches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_independent_of_completion_order() {
        let slow = Arc::new(FakeProvider {
            delay: Some(Duration::from_millis(300)),
            ..FakeProvider::returning("slow", vec!["A"])
        });
        let fast = Arc::new(FakeProvider::returning("fast", vec!["B"]));
        let first = aggregator(vec![slow.clone(), fast.clone()])
            .screen_individual(&ScreeningSubject::individual("A"))
            .await;
        let second = aggregator(vec![fast, slow])
            .screen_individual(&ScreeningSubject::individual("A"))
            .await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_address_screen_routes_by_kind() {
        let alpha = Arc::new(FakeProvider::returning("alpha", vec!["Lazarus Group"]));
        let aggregator = aggregator(vec![alpha.clone()]);

        let result = aggregator
            .screen(&ScreeningSubject::address("0xdeadbeef", "ethereum"))
            .await;

        assert_eq!(alpha.call_count(), 1);
        assert_eq!(result.total_matches(), 1);
    }
}
