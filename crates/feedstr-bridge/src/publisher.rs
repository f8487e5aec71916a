//! Event delivery to the configured relay set.
//!
//! Delivery is per-destination, sequential, and independent: each
//! destination gets its own timeout budget, a failure is logged and the
//! fan-out moves on, and no destination is retried within the same call.
//! Dry-run mode replaces the network entirely with a log line carrying the
//! serialized event; everything upstream (store mutations, state
//! transitions) behaves exactly as in a real run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nostr::{Event, JsonUtil};
use nostr_sdk::Client;

/// Seam between the publisher's fan-out policy and the wire.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver one event to one destination.
    async fn deliver(&self, destination: &str, event: &Event) -> Result<(), String>;
}

/// Production transport backed by a nostr-sdk client.
///
/// Destinations are added once at startup; the client manages the
/// underlying connections across publish calls.
pub struct NostrTransport {
    client: Client,
}

impl NostrTransport {
    /// Build a transport with all destinations registered.
    pub async fn connect(destinations: &[String]) -> Self {
        let client = Client::default();
        for destination in destinations {
            if let Err(e) = client.add_relay(destination.as_str()).await {
                tracing::warn!(destination = %destination, error = %e, "failed to add relay");
            }
        }
        client.connect().await;
        Self { client }
    }
}

#[async_trait]
impl RelayTransport for NostrTransport {
    async fn deliver(&self, destination: &str, event: &Event) -> Result<(), String> {
        let output = self
            .client
            .send_event_to([destination], event)
            .await
            .map_err(|e| e.to_string())?;

        if output.success.is_empty() {
            let reasons: Vec<String> = output
                .failed
                .iter()
                .map(|(url, reason)| format!("{url}: {reason:?}"))
                .collect();
            return Err(reasons.join("; "));
        }
        Ok(())
    }
}

/// Outcome of one destination within a publish call.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub destination: String,
    pub result: Result<(), String>,
}

/// Per-destination results of one publish call.
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
    pub outcomes: Vec<DeliveryOutcome>,
    pub dry_run: bool,
}

impl PublishSummary {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Multi-destination publisher with partial-failure tolerance.
pub struct Publisher {
    destinations: Vec<String>,
    timeout: Duration,
    dry_run: bool,
    transport: Arc<dyn RelayTransport>,
}

impl Publisher {
    pub fn new(
        destinations: Vec<String>,
        timeout: Duration,
        dry_run: bool,
        transport: Arc<dyn RelayTransport>,
    ) -> Self {
        Self {
            destinations,
            timeout,
            dry_run,
            transport,
        }
    }

    /// The configured destination list.
    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// Whether delivery is replaced by logging.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Deliver one signed event to every destination.
    pub async fn publish(&self, event: &Event) -> PublishSummary {
        if self.dry_run {
            tracing::info!(event = %event.as_json(), "dry-run: would publish event");
            return PublishSummary {
                outcomes: Vec::new(),
                dry_run: true,
            };
        }

        let mut outcomes = Vec::with_capacity(self.destinations.len());

        for destination in &self.destinations {
            let result =
                match tokio::time::timeout(self.timeout, self.transport.deliver(destination, event))
                    .await
                {
                    Ok(Ok(())) => {
                        tracing::debug!(destination = %destination, id = %event.id, "event published");
                        metrics::counter!("publish_deliveries_total").increment(1);
                        Ok(())
                    }
                    Ok(Err(reason)) => {
                        tracing::warn!(destination = %destination, error = %reason, "publish failed");
                        metrics::counter!("publish_failures_total").increment(1);
                        Err(reason)
                    }
                    Err(_) => {
                        let reason = format!("timed out after {:?}", self.timeout);
                        tracing::warn!(destination = %destination, "publish timed out");
                        metrics::counter!("publish_failures_total").increment(1);
                        Err(reason)
                    }
                };

            outcomes.push(DeliveryOutcome {
                destination: destination.clone(),
                result,
            });
        }

        PublishSummary {
            outcomes,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedstr_core::FeedIdentity;
    use nostr::EventBuilder;

    /// Test transport that fails for a chosen set of destinations.
    pub(crate) struct FlakyTransport {
        failing: Vec<String>,
    }

    impl FlakyTransport {
        pub(crate) fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl RelayTransport for FlakyTransport {
        async fn deliver(&self, destination: &str, _event: &Event) -> Result<(), String> {
            if self.failing.iter().any(|f| f == destination) {
                Err("connection refused".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn signed_event() -> Event {
        let identity = FeedIdentity::generate();
        EventBuilder::text_note("hello")
            .sign_with_keys(identity.keys())
            .unwrap()
    }

    #[tokio::test]
    async fn test_middle_destination_failure_does_not_abort() {
        let destinations = vec![
            "wss://one.example".to_string(),
            "wss://two.example".to_string(),
            "wss://three.example".to_string(),
        ];
        let publisher = Publisher::new(
            destinations,
            Duration::from_secs(1),
            false,
            Arc::new(FlakyTransport::new(&["wss://two.example"])),
        );

        let summary = publisher.publish(&signed_event()).await;

        assert_eq!(summary.outcomes.len(), 3);
        assert!(summary.outcomes[0].result.is_ok());
        assert!(summary.outcomes[1].result.is_err());
        assert!(summary.outcomes[2].result.is_ok());
        assert_eq!(summary.delivered(), 2);
        assert_eq!(summary.failed(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_skips_network() {
        // A transport that panics if touched proves dry-run short-circuits.
        struct PanicTransport;

        #[async_trait]
        impl RelayTransport for PanicTransport {
            async fn deliver(&self, _destination: &str, _event: &Event) -> Result<(), String> {
                panic!("dry-run must not touch the transport");
            }
        }

        let publisher = Publisher::new(
            vec!["wss://one.example".to_string()],
            Duration::from_secs(1),
            true,
            Arc::new(PanicTransport),
        );

        let summary = publisher.publish(&signed_event()).await;
        assert!(summary.dry_run);
        assert!(summary.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_slow_destination_hits_its_own_timeout() {
        struct SlowTransport;

        #[async_trait]
        impl RelayTransport for SlowTransport {
            async fn deliver(&self, destination: &str, _event: &Event) -> Result<(), String> {
                if destination.contains("slow") {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(())
            }
        }

        tokio::time::pause();

        let publisher = Publisher::new(
            vec![
                "wss://slow.example".to_string(),
                "wss://fast.example".to_string(),
            ],
            Duration::from_secs(1),
            false,
            Arc::new(SlowTransport),
        );

        let summary = publisher.publish(&signed_event()).await;

        // The slow destination burns only its own budget; the fast one
        // still succeeds.
        assert!(summary.outcomes[0].result.is_err());
        assert!(summary.outcomes[1].result.is_ok());
    }
}
