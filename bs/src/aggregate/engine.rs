//! AggregateEngine - actor that owns the session store
//!
//! Processes commands one at a time, so it is the only writer of logs,
//! stats and unseen counters.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sessionstore::{KvStore, StoreError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::badge::Badge;
use super::config::RetentionConfig;
use super::messages::{AggregateCommand, AggregateError, AggregateResponse, WriteOutcome};
use super::transform::{LOGS_KEY, STATS_KEY, Snapshot, UNSEEN_KEY};
use crate::domain::{DomainEvent, LogType, timestamp_now};

const COMMAND_BUFFER: usize = 256;

/// Handle to send commands to the AggregateEngine
#[derive(Clone)]
pub struct AggregateEngine {
    tx: mpsc::Sender<AggregateCommand>,
}

impl AggregateEngine {
    /// Spawn the actor over a session-scoped store
    pub fn spawn(store: Box<dyn KvStore>, retention: RetentionConfig) -> Self {
        debug!(scope = ?store.scope(), max = retention.max_entries_per_type, "spawn: called");
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(actor_loop(store, retention, rx));
        info!("AggregateEngine spawned");
        Self { tx }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<AggregateResponse<T>>) -> AggregateCommand,
    ) -> AggregateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| AggregateError::ChannelError)?;
        reply_rx.await.map_err(|_| AggregateError::ChannelError)?
    }

    pub async fn record_event(&self, event: DomainEvent) -> AggregateResponse<WriteOutcome> {
        debug!(event_type = %event.event_type, "record_event: called");
        self.request(|reply| AggregateCommand::RecordEvent { event, reply }).await
    }

    pub async fn record_warn(&self, message: impl Into<String>) -> AggregateResponse<WriteOutcome> {
        let message = message.into();
        debug!(%message, "record_warn: called");
        self.request(|reply| AggregateCommand::RecordWarn { message, reply }).await
    }

    pub async fn record_error(&self, message: impl Into<String>, is_critical: bool) -> AggregateResponse<WriteOutcome> {
        let message = message.into();
        debug!(%message, is_critical, "record_error: called");
        self.request(|reply| AggregateCommand::RecordError {
            message,
            is_critical,
            reply,
        })
        .await
    }

    pub async fn clear_unseen(&self, log_type: LogType) -> AggregateResponse<WriteOutcome> {
        debug!(%log_type, "clear_unseen: called");
        self.request(|reply| AggregateCommand::ClearUnseen { log_type, reply })
            .await
    }

    /// Current snapshot, reflecting every write sent before this call
    pub async fn get_everything(&self) -> AggregateResponse<Snapshot> {
        debug!("get_everything: called");
        self.request(|reply| AggregateCommand::GetEverything { reply }).await
    }

    pub async fn reset(&self) -> AggregateResponse<Snapshot> {
        debug!("reset: called");
        self.request(|reply| AggregateCommand::Reset { reply }).await
    }

    pub async fn shutdown(&self) -> AggregateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(AggregateCommand::Shutdown)
            .await
            .map_err(|_| AggregateError::ChannelError)
    }
}

fn take<T: DeserializeOwned + Default>(values: &mut BTreeMap<String, Value>, key: &'static str) -> AggregateResponse<T> {
    match values.remove(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| AggregateError::Corrupt {
            key,
            reason: e.to_string(),
        }),
    }
}

fn load(store: &dyn KvStore) -> AggregateResponse<Snapshot> {
    let mut values = store.get(&[STATS_KEY, LOGS_KEY, UNSEEN_KEY])?;
    Ok(Snapshot {
        stats: take(&mut values, STATS_KEY)?,
        logs: take(&mut values, LOGS_KEY)?,
        unseen: take(&mut values, UNSEEN_KEY)?,
    })
}

fn persist(store: &mut dyn KvStore, snapshot: &Snapshot) -> AggregateResponse<()> {
    let entries = BTreeMap::from([
        (
            STATS_KEY.to_string(),
            serde_json::to_value(&snapshot.stats).map_err(StoreError::from)?,
        ),
        (
            LOGS_KEY.to_string(),
            serde_json::to_value(&snapshot.logs).map_err(StoreError::from)?,
        ),
        (
            UNSEEN_KEY.to_string(),
            serde_json::to_value(snapshot.unseen).map_err(StoreError::from)?,
        ),
    ]);
    store.set(entries)?;
    Ok(())
}

/// Load, transform, trim to the retention limit, persist
fn write(
    store: &mut dyn KvStore,
    retention: &RetentionConfig,
    changed: LogType,
    transform: impl FnOnce(&mut Snapshot),
) -> AggregateResponse<WriteOutcome> {
    let mut snapshot = load(store)?;
    transform(&mut snapshot);
    snapshot.retain(retention.limit());
    persist(store, &snapshot)?;
    Ok(WriteOutcome {
        unseen: snapshot.unseen,
        badge: Badge::compute(&snapshot.unseen, changed),
    })
}

fn reset(store: &mut dyn KvStore) -> AggregateResponse<Snapshot> {
    for key in [STATS_KEY, LOGS_KEY, UNSEEN_KEY] {
        store.remove(key)?;
    }
    Ok(Snapshot::default())
}

async fn actor_loop(mut store: Box<dyn KvStore>, retention: RetentionConfig, mut rx: mpsc::Receiver<AggregateCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            AggregateCommand::RecordEvent { event, reply } => {
                debug!(event_type = %event.event_type, "actor_loop: RecordEvent command");
                let result = write(store.as_mut(), &retention, LogType::Event, |s| {
                    s.record_event(timestamp_now(), &event);
                });
                let _ = reply.send(result);
            }

            AggregateCommand::RecordWarn { message, reply } => {
                debug!("actor_loop: RecordWarn command");
                let result = write(store.as_mut(), &retention, LogType::Warn, |s| {
                    s.record_warn(timestamp_now(), &message)
                });
                let _ = reply.send(result);
            }

            AggregateCommand::RecordError {
                message,
                is_critical,
                reply,
            } => {
                debug!(is_critical, "actor_loop: RecordError command");
                let result = write(store.as_mut(), &retention, LogType::Error, |s| {
                    s.record_error(timestamp_now(), &message, is_critical)
                });
                let _ = reply.send(result);
            }

            AggregateCommand::ClearUnseen { log_type, reply } => {
                debug!(%log_type, "actor_loop: ClearUnseen command");
                let result = write(store.as_mut(), &retention, log_type, |s| s.clear_unseen(log_type));
                let _ = reply.send(result);
            }

            AggregateCommand::GetEverything { reply } => {
                debug!("actor_loop: GetEverything command");
                let _ = reply.send(load(store.as_ref()));
            }

            AggregateCommand::Reset { reply } => {
                info!("Resetting session logs and stats");
                let result = reset(store.as_mut());
                if let Err(e) = &result {
                    warn!(error = %e, "Failed to reset session store");
                }
                let _ = reply.send(result);
            }

            AggregateCommand::Shutdown => {
                info!("AggregateEngine shutting down");
                break;
            }
        }
    }

    debug!("AggregateEngine actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::BadgeColor;
    use crate::domain::EventKind;
    use serde_json::json;
    use sessionstore::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn engine() -> AggregateEngine {
        AggregateEngine::spawn(Box::new(MemoryStore::new()), RetentionConfig::default())
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let engine = engine();
        engine.record_event(DomainEvent::claim("alice", "A")).await.unwrap();
        engine.record_event(DomainEvent::claim("alice", "B")).await.unwrap();
        engine.record_event(DomainEvent::kakera("alice", 5, "P")).await.unwrap();
        engine.record_event(DomainEvent::kakera("bob", 3, "P")).await.unwrap();

        let snapshot = engine.get_everything().await.unwrap();
        assert_eq!(snapshot.stats.characters["alice"], vec!["A", "B"]);
        assert_eq!(snapshot.stats.kakera.per_type["P"], 2);
        assert_eq!(snapshot.stats.kakera.amount["alice"], 5);
        assert_eq!(snapshot.stats.kakera.amount["bob"], 3);
        assert_eq!(snapshot.unseen.event, 4);
    }

    #[tokio::test]
    async fn test_get_everything_is_idempotent() {
        let engine = engine();
        engine.record_warn("careful").await.unwrap();
        let first = engine.get_everything().await.unwrap();
        let second = engine.get_everything().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let engine = engine();
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .record_event(DomainEvent::kakera("alice", 1, if i % 2 == 0 { "P" } else { "Y" }))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = engine.get_everything().await.unwrap();
        assert_eq!(snapshot.unseen.event, 50);
        assert_eq!(snapshot.logs.event.len(), 50);
        assert_eq!(snapshot.stats.kakera.amount["alice"], 50);
        assert_eq!(snapshot.stats.kakera.per_type["P"] + snapshot.stats.kakera.per_type["Y"], 50);
    }

    #[tokio::test]
    async fn test_badge_after_error_then_event() {
        let engine = engine();
        engine.record_error("boom", false).await.unwrap();
        let outcome = engine.record_event(DomainEvent::claim("alice", "A")).await.unwrap();
        assert_eq!(outcome.unseen.event, 1);
        assert_eq!(outcome.unseen.error, 1);
        assert_eq!(outcome.badge.text, "2");
        assert_eq!(outcome.badge.color, BadgeColor::Error);
    }

    #[tokio::test]
    async fn test_clear_events_then_record_event() {
        let engine = engine();
        engine.record_event(DomainEvent::claim("alice", "A")).await.unwrap();
        engine.record_event(DomainEvent::claim("alice", "B")).await.unwrap();
        let cleared = engine.clear_unseen(LogType::Event).await.unwrap();
        assert_eq!(cleared.unseen.event, 0);

        let outcome = engine.record_event(DomainEvent::claim("bob", "C")).await.unwrap();
        assert_eq!(outcome.unseen.event, 1);
        assert_eq!(outcome.badge.text, "1");
        assert_eq!(outcome.badge.color, BadgeColor::Event);

        let snapshot = engine.get_everything().await.unwrap();
        assert_eq!(snapshot.logs.event.len(), 3);
        assert_eq!(snapshot.unseen.event, 1);
    }

    #[tokio::test]
    async fn test_clear_then_record() {
        let engine = engine();
        engine.record_warn("w").await.unwrap();
        let cleared = engine.clear_unseen(LogType::Warn).await.unwrap();
        assert_eq!(cleared.unseen.warn, 0);
        assert_eq!(cleared.badge.text, "");

        let outcome = engine.record_warn("w2").await.unwrap();
        assert_eq!(outcome.unseen.warn, 1);
        assert_eq!(engine.get_everything().await.unwrap().logs.warn.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_event_data_is_logged() {
        let engine = engine();
        let event = DomainEvent::new(EventKind::Soulmate, json!("not an object"));
        let outcome = engine.record_event(event).await.unwrap();
        assert_eq!(outcome.unseen.event, 1);
        assert!(engine.get_everything().await.unwrap().stats.soulmates.is_empty());
    }

    #[tokio::test]
    async fn test_retention_evicts_oldest() {
        let engine = AggregateEngine::spawn(
            Box::new(MemoryStore::new()),
            RetentionConfig {
                max_entries_per_type: 3,
            },
        );
        for i in 0..5 {
            engine.record_warn(format!("w{}", i)).await.unwrap();
        }
        let snapshot = engine.get_everything().await.unwrap();
        assert_eq!(snapshot.logs.warn.len(), 3);
        assert_eq!(snapshot.unseen.warn, 3);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let engine = engine();
        engine.record_event(DomainEvent::claim("alice", "A")).await.unwrap();
        engine.record_error("boom", true).await.unwrap();
        assert_eq!(engine.reset().await.unwrap(), Snapshot::default());
        assert_eq!(engine.get_everything().await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn test_corrupt_store_reports_error_and_keeps_running() {
        let mut store = MemoryStore::new();
        store
            .set(BTreeMap::from([(UNSEEN_KEY.to_string(), json!("seven"))]))
            .unwrap();
        let engine = AggregateEngine::spawn(Box::new(store), RetentionConfig::default());

        let err = engine.record_warn("w").await.unwrap_err();
        assert!(matches!(err, AggregateError::Corrupt { key: UNSEEN_KEY, .. }));

        engine.reset().await.unwrap();
        assert_eq!(engine.record_warn("w").await.unwrap().unseen.warn, 1);
    }

    #[tokio::test]
    async fn test_file_backed_engine_survives_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.json");

        let engine = AggregateEngine::spawn(Box::new(FileStore::open(&path).unwrap()), RetentionConfig::default());
        engine.record_event(DomainEvent::soulmate("carol", "Makima")).await.unwrap();
        engine.shutdown().await.unwrap();

        let engine = AggregateEngine::spawn(Box::new(FileStore::open(&path).unwrap()), RetentionConfig::default());
        let snapshot = engine.get_everything().await.unwrap();
        assert_eq!(snapshot.stats.soulmates["carol"], vec!["Makima"]);
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel() {
        let engine = engine();
        engine.shutdown().await.unwrap();
        // Queued behind the shutdown, so the reply is dropped
        let result = engine.get_everything().await;
        assert!(matches!(result, Err(AggregateError::ChannelError)));
    }
}
