//! Batch dispatcher: bounded, best-effort hand-off to the push transport.
//!
//! Splits the delivery list into batches of at most `batch_size`, preserving
//! order, and submits every batch regardless of how earlier batches fared.
//! Each transport call is bounded by `timeout`; a timeout counts as a failed
//! batch. Items the transport classifies as unreachable have their token
//! deleted. Nothing here is retried and nothing here returns an error: the
//! caller gets a report, not a `Result`.

use std::time::Duration;

use walwal_common::config::{AppConfig, MAX_PUSH_BATCH_SIZE};
use walwal_common::types::DeliveryItem;

use crate::tokens::TokenCleanup;
use crate::transport::{ItemOutcome, PushTransport, TransportError};

/// Dispatcher tuning, injected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub timeout: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.push_batch_size,
            timeout: Duration::from_millis(config.push_timeout_ms),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_PUSH_BATCH_SIZE,
            timeout: Duration::from_secs(5),
        }
    }
}

/// What happened to one `dispatch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of batches submitted.
    pub batches: usize,
    /// Batches that failed as a whole (error or timeout).
    pub failed_batches: usize,
    pub delivered: usize,
    /// Unreachable tokens actually removed from the token store.
    pub tokens_removed: usize,
    /// `(token, outcome)` per input item, in input order.
    pub outcomes: Vec<(String, ItemOutcome)>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered
    }
}

/// Split `items` into consecutive slices of at most `batch_size` elements.
pub fn split_into_batches<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

/// Best-effort batch dispatcher over a transport and a token cleanup sink.
pub struct BatchDispatcher<T, C> {
    transport: T,
    cleanup: C,
    settings: DispatchSettings,
}

impl<T: PushTransport, C: TokenCleanup> BatchDispatcher<T, C> {
    pub fn new(transport: T, cleanup: C, settings: DispatchSettings) -> Self {
        let settings = DispatchSettings {
            batch_size: settings.batch_size.max(1),
            ..settings
        };
        Self {
            transport,
            cleanup,
            settings,
        }
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// Submit `items` in batches and collect per-item outcomes.
    pub async fn dispatch(&self, items: &[DeliveryItem]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, batch) in split_into_batches(items, self.settings.batch_size)
            .into_iter()
            .enumerate()
        {
            report.batches += 1;

            let outcomes = match self.submit(batch).await {
                Ok(outcomes) => align_outcomes(outcomes, batch.len()),
                Err(e) => {
                    tracing::warn!(
                        transport = self.transport.name(),
                        batch = index,
                        size = batch.len(),
                        error = %e,
                        "Push batch failed, continuing with remaining batches"
                    );
                    report.failed_batches += 1;
                    vec![ItemOutcome::Failed(e.to_string()); batch.len()]
                }
            };

            for (item, outcome) in batch.iter().zip(outcomes) {
                self.handle_outcome(item, &outcome, &mut report).await;
                report.outcomes.push((item.token.clone(), outcome));
            }
        }

        if !items.is_empty() {
            tracing::info!(
                transport = self.transport.name(),
                items = items.len(),
                batches = report.batches,
                failed_batches = report.failed_batches,
                delivered = report.delivered,
                tokens_removed = report.tokens_removed,
                "Push dispatch finished"
            );
        }

        report
    }

    async fn submit(&self, batch: &[DeliveryItem]) -> Result<Vec<ItemOutcome>, TransportError> {
        match tokio::time::timeout(self.settings.timeout, self.transport.send_batch(batch)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.settings.timeout)),
        }
    }

    async fn handle_outcome(
        &self,
        item: &DeliveryItem,
        outcome: &ItemOutcome,
        report: &mut DispatchReport,
    ) {
        match outcome {
            ItemOutcome::Delivered => report.delivered += 1,
            ItemOutcome::Unreachable(reason) => {
                match self.cleanup.delete_token(&item.token).await {
                    Ok(true) => {
                        report.tokens_removed += 1;
                        tracing::info!(
                            token = %token_hint(&item.token),
                            reason = %reason,
                            "Removed unreachable push token"
                        );
                    }
                    Ok(false) => {
                        tracing::debug!(
                            token = %token_hint(&item.token),
                            "Unreachable push token was already removed"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            token = %token_hint(&item.token),
                            error = %e,
                            "Failed to remove unreachable push token"
                        );
                    }
                }
            }
            ItemOutcome::Failed(reason) => {
                tracing::warn!(
                    token = %token_hint(&item.token),
                    reason = %reason,
                    "Push delivery failed"
                );
            }
            ItemOutcome::SerializationFailed(reason) => {
                tracing::error!(
                    token = %token_hint(&item.token),
                    reason = %reason,
                    "Push payload could not be serialized, item dropped"
                );
            }
        }
    }
}

/// Pad or truncate a transport's outcome list to the batch length.
fn align_outcomes(mut outcomes: Vec<ItemOutcome>, len: usize) -> Vec<ItemOutcome> {
    if outcomes.len() != len {
        tracing::warn!(
            expected = len,
            actual = outcomes.len(),
            "Transport returned a mismatched outcome count"
        );
    }
    outcomes.truncate(len);
    outcomes.resize(
        len,
        ItemOutcome::Failed("no outcome reported by transport".to_string()),
    );
    outcomes
}

/// Leading characters of a token, enough to correlate log lines.
pub(crate) fn token_hint(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use walwal_common::error::AppError;

    /// Records every batch it sees; fails the batch indices in `fail_batches`,
    /// stalls the ones in `stall_batches`, and reports tokens in `unreachable`
    /// as unregistered.
    #[derive(Default)]
    struct ScriptedTransport {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
        fail_batches: HashSet<usize>,
        stall_batches: HashSet<usize>,
        unreachable: HashSet<String>,
    }

    impl PushTransport for ScriptedTransport {
        async fn send_batch(
            &self,
            batch: &[DeliveryItem],
        ) -> Result<Vec<ItemOutcome>, TransportError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(batch.iter().map(|i| i.token.clone()).collect());

            if self.stall_batches.contains(&index) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.fail_batches.contains(&index) {
                return Err(TransportError::Gateway("simulated outage".to_string()));
            }

            Ok(batch
                .iter()
                .map(|item| {
                    if self.unreachable.contains(&item.token) {
                        ItemOutcome::Unreachable("UNREGISTERED".to_string())
                    } else {
                        ItemOutcome::Delivered
                    }
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingCleanup {
        deleted: Mutex<Vec<String>>,
    }

    impl TokenCleanup for RecordingCleanup {
        async fn delete_token(&self, token: &str) -> Result<bool, AppError> {
            let mut deleted = self.deleted.lock().unwrap();
            if deleted.iter().any(|t| t == token) {
                return Ok(false);
            }
            deleted.push(token.to_string());
            Ok(true)
        }
    }

    fn items(n: usize) -> Vec<DeliveryItem> {
        (0..n)
            .map(|i| DeliveryItem {
                token: format!("token-{i}"),
                title: "title".to_string(),
                body: "body".to_string(),
                deep_link: "walwal://mission".to_string(),
            })
            .collect()
    }

    fn settings(batch_size: usize) -> DispatchSettings {
        DispatchSettings {
            batch_size,
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_split_into_batches_counts_and_order() {
        let input: Vec<usize> = (0..23).collect();
        for batch_size in 1..=12 {
            let batches = split_into_batches(&input, batch_size);
            assert_eq!(batches.len(), input.len().div_ceil(batch_size));
            assert!(batches.iter().all(|b| b.len() <= batch_size && !b.is_empty()));
            let rejoined: Vec<usize> = batches.concat();
            assert_eq!(rejoined, input);
        }
    }

    #[test]
    fn test_split_empty_input() {
        let input: Vec<u8> = Vec::new();
        assert!(split_into_batches(&input, 10).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_submits_all_batches_in_order() {
        let dispatcher = BatchDispatcher::new(
            ScriptedTransport::default(),
            RecordingCleanup::default(),
            settings(10),
        );
        let input = items(25);
        let report = dispatcher.dispatch(&input).await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.delivered, 25);
        assert_eq!(report.failed(), 0);

        let seen = dispatcher.transport.seen.lock().unwrap().clone();
        assert_eq!(seen.iter().map(Vec::len).collect::<Vec<_>>(), vec![10, 10, 5]);
        let flattened: Vec<String> = seen.concat();
        let expected: Vec<String> = input.iter().map(|i| i.token.clone()).collect();
        assert_eq!(flattened, expected);
    }

    #[tokio::test]
    async fn test_failed_middle_batch_does_not_stop_the_rest() {
        let transport = ScriptedTransport {
            fail_batches: HashSet::from([1]),
            ..Default::default()
        };
        let dispatcher = BatchDispatcher::new(transport, RecordingCleanup::default(), settings(2));
        let report = dispatcher.dispatch(&items(6)).await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.delivered, 4);

        let seen = dispatcher.transport.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3, "batches #1 and #3 must still be submitted");
        assert_eq!(seen[0], vec!["token-0", "token-1"]);
        assert_eq!(seen[2], vec!["token-4", "token-5"]);
        assert!(matches!(report.outcomes[2].1, ItemOutcome::Failed(_)));
        assert!(matches!(report.outcomes[3].1, ItemOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_timed_out_batch_is_treated_as_failed() {
        let transport = ScriptedTransport {
            stall_batches: HashSet::from([0]),
            ..Default::default()
        };
        let dispatcher = BatchDispatcher::new(transport, RecordingCleanup::default(), settings(3));
        let report = dispatcher.dispatch(&items(6)).await;

        assert_eq!(report.batches, 2);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.delivered, 3);
        match &report.outcomes[0].1 {
            ItemOutcome::Failed(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_tokens_are_deleted() {
        let transport = ScriptedTransport {
            unreachable: HashSet::from(["token-1".to_string(), "token-3".to_string()]),
            ..Default::default()
        };
        let dispatcher = BatchDispatcher::new(transport, RecordingCleanup::default(), settings(10));
        let report = dispatcher.dispatch(&items(4)).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.tokens_removed, 2);
        let deleted = dispatcher.cleanup.deleted.lock().unwrap().clone();
        assert_eq!(deleted, vec!["token-1", "token-3"]);
    }

    #[tokio::test]
    async fn test_deleting_already_removed_token_is_not_an_error() {
        let transport = ScriptedTransport {
            unreachable: HashSet::from(["token-0".to_string()]),
            ..Default::default()
        };
        let dispatcher = BatchDispatcher::new(transport, RecordingCleanup::default(), settings(10));

        let first = dispatcher.dispatch(&items(1)).await;
        let second = dispatcher.dispatch(&items(1)).await;

        assert_eq!(first.tokens_removed, 1);
        assert_eq!(second.tokens_removed, 0);
        assert!(matches!(second.outcomes[0].1, ItemOutcome::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_clamped() {
        let dispatcher = BatchDispatcher::new(
            ScriptedTransport::default(),
            RecordingCleanup::default(),
            settings(0),
        );
        assert_eq!(dispatcher.settings().batch_size, 1);
        let report = dispatcher.dispatch(&items(3)).await;
        assert_eq!(report.batches, 3);
    }

    #[test]
    fn test_align_outcomes_pads_missing_entries() {
        let aligned = align_outcomes(vec![ItemOutcome::Delivered], 3);
        assert_eq!(aligned.len(), 3);
        assert!(aligned[0].is_delivered());
        assert!(matches!(aligned[2], ItemOutcome::Failed(_)));

        let truncated = align_outcomes(vec![ItemOutcome::Delivered; 4], 2);
        assert_eq!(truncated.len(), 2);
    }

    #[test]
    fn test_token_hint_truncates() {
        assert_eq!(token_hint("abcdefghijklmnop"), "abcdefgh…");
        assert_eq!(token_hint("abc"), "abc…");
    }
}
