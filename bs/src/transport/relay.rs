//! Broadcast relay to every connected page

use futures::future::join_all;
use tracing::{debug, warn};

use super::PageTransport;
use crate::protocol::{Envelope, RelayFailure, RelayReport};

/// Send `envelope` to every page concurrently
///
/// Each send stands alone: a failing page is recorded in the report and
/// never stops the others.
pub async fn broadcast<T: PageTransport + ?Sized>(transport: &T, envelope: &Envelope) -> RelayReport {
    let pages = transport.pages().await;
    debug!(id = %envelope.id, pages = pages.len(), "broadcast: called");

    let results = join_all(pages.into_iter().map(|page| async move {
        let result = transport.request(&page, envelope.clone()).await;
        (page, result)
    }))
    .await;

    let mut report = RelayReport::default();
    for (page, result) in results {
        match result {
            Ok(_) => report.delivered.push(page),
            Err(e) => {
                warn!(%page, error = %e, "Relay to page failed");
                report.failures.push(RelayFailure {
                    page_id: page,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageId, PageId};
    use crate::transport::ChannelPages;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_one_failure_does_not_block_siblings() {
        let pages = ChannelPages::new();
        pages.connect(PageId::new("ok-1")).await.serve(|_| Some(Value::Null));
        let dead = pages.connect(PageId::new("dead")).await;
        drop(dead);
        pages.connect(PageId::new("ok-2")).await.serve(|_| Some(Value::Null));

        let report = broadcast(&pages, &Envelope::with_data(MessageId::BotSyncPreferences, json!({}))).await;
        assert_eq!(report.delivered, vec![PageId::new("ok-1"), PageId::new("ok-2")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].page_id, PageId::new("dead"));
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_no_pages_is_empty_report() {
        let pages = ChannelPages::new();
        let report = broadcast(&pages, &Envelope::new(MessageId::BotSyncPreferences)).await;
        assert!(report.delivered.is_empty());
        assert!(report.is_complete());
    }
}
