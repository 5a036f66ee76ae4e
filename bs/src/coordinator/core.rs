//! Main Coordinator task implementation

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use sessionstore::KvStore;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, Push};
use crate::aggregate::{AggregateEngine, AggregateResponse, Badge, WriteOutcome};
use crate::domain::{DomainEvent, LogType, Preferences, RunState, Unseen};
use crate::protocol::{
    Ack, ClearUnseenRequest, Envelope, ErrorReport, InjectReply, MessageId, PageHello, PageId, ProtocolError,
    Sender, StatusReply, ToggleReply, WarnReport,
};
use crate::state::{RunStateMachine, TransitionError, run_guard};
use crate::transport::{PageTransport, broadcast as relay};

/// Durable store key holding the last preferences in wire form
pub const PREFERENCES_KEY: &str = "preferences";

const NO_PAGE: &str = "No page is connected.";

/// The Coordinator owns the run state and routes every inbound message
pub struct Coordinator {
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    push_tx: broadcast::Sender<Push>,
    pages: Arc<dyn PageTransport>,
    engine: AggregateEngine,
    durable: Box<dyn KvStore>,
    machine: RunStateMachine,
    /// Most recent page sender
    last_page: Option<PageId>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        pages: Arc<dyn PageTransport>,
        engine: AggregateEngine,
        durable: Box<dyn KvStore>,
    ) -> Self {
        debug!(?config, "Coordinator::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        let (push_tx, _) = broadcast::channel(config.push_buffer);
        Self {
            tx,
            rx,
            push_tx,
            pages,
            engine,
            durable,
            machine: RunStateMachine::new(),
            last_page: None,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), self.push_tx.clone())
    }

    /// Start the task and return its handle
    pub fn spawn(self) -> CoordinatorHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    /// Run the Coordinator task
    ///
    /// Queries the page status once, then handles requests one at a time
    /// until shutdown is requested.
    pub async fn run(mut self) {
        info!("Coordinator started");
        self.refresh_status().await;

        while let Some(req) = self.rx.recv().await {
            match req {
                CoordRequest::Deliver { sender, payload, reply } => {
                    if let Some(answer) = self.dispatch(sender, payload).await {
                        let _ = reply.send(answer);
                    }
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        debug!("Coordinator stopped");
    }

    async fn dispatch(&mut self, sender: Sender, payload: Value) -> Option<Value> {
        let envelope = match Envelope::parse(&payload) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return None,
            Err(e) => {
                debug!(%sender, error = %e, "dispatch: ignoring payload");
                return None;
            }
        };

        if !envelope.id.direction().accepts(&sender) {
            let e = ProtocolError::WrongDirection {
                id: envelope.id,
                sender: sender.to_string(),
            };
            debug!(error = %e, "dispatch: ignoring payload");
            return None;
        }

        if let Sender::Page { page_id } = &sender {
            self.last_page = Some(page_id.clone());
        }

        debug!(%sender, id = %envelope.id, "dispatch: routing");
        match envelope.id {
            MessageId::SurfaceGetRunState => Some(self.run_state_reply()),
            MessageId::SurfaceRefreshState => self.handle_refresh().await,
            MessageId::SurfaceRun => self.handle_run(&envelope).await,
            MessageId::SurfaceToggle => self.handle_toggle(&envelope).await,
            MessageId::SurfaceGetEverything => self.handle_get_everything().await,
            MessageId::SurfaceClearUnseen => self.handle_clear_unseen(&envelope).await,
            MessageId::SurfaceResetSession => self.handle_reset().await,
            MessageId::SurfaceSyncPreferences => self.handle_sync_preferences(&envelope).await,
            // Streaming is done by the socket listener; here it is a no-op
            MessageId::SurfaceWatch => Some(json!(Ack::ok())),
            MessageId::PageHello => self.handle_hello(&envelope).await,
            MessageId::PageEvent => self.handle_event(&envelope).await,
            MessageId::PageWarn => self.handle_warn(&envelope).await,
            MessageId::PageError => self.handle_error(&envelope).await,
            MessageId::BotStatusQuery
            | MessageId::BotInject
            | MessageId::BotToggle
            | MessageId::BotSyncPreferences
            | MessageId::BotRunState
            | MessageId::BotBadge => None,
        }
    }

    // === Helpers ===

    fn run_state_reply(&self) -> Value {
        json!(self.machine.view())
    }

    fn push(&self, push: Push) {
        // No subscribers is fine
        let _ = self.push_tx.send(push);
    }

    fn push_run_state(&self) {
        self.push(Push::RunState(self.machine.view()));
    }

    fn after_write(&self, result: AggregateResponse<WriteOutcome>) -> Option<Unseen> {
        match result {
            Ok(outcome) => {
                self.push(Push::Badge(outcome.badge));
                Some(outcome.unseen)
            }
            Err(e) => {
                warn!(error = %e, "Aggregation write failed");
                None
            }
        }
    }

    async fn record_failure(&self, message: &str) {
        let result = self.engine.record_error(message, true).await;
        self.after_write(result);
    }

    async fn transition_failed(&self, e: TransitionError) {
        warn!(error = %e, state = %self.machine.state(), "Run state transition rejected");
        self.record_failure(&e.to_string()).await;
    }

    async fn target_page(&self) -> Option<PageId> {
        let pages = self.pages.pages().await;
        if let Some(last) = &self.last_page
            && pages.contains(last)
        {
            return Some(last.clone());
        }
        pages.into_iter().next()
    }

    /// Decode preferences from the envelope, else use the stored ones
    ///
    /// Bad preferences drop the message.
    fn preferences_from(&mut self, envelope: &Envelope) -> Option<Preferences> {
        let Some(data) = &envelope.data else {
            return Some(self.load_preferences());
        };
        match Preferences::from_wire(data) {
            Ok(prefs) => {
                self.save_preferences(&prefs);
                Some(prefs)
            }
            Err(e) => {
                warn!(id = %envelope.id, error = %e, "Dropping message with bad preferences");
                None
            }
        }
    }

    fn load_preferences(&self) -> Preferences {
        match self.durable.get(&[PREFERENCES_KEY]) {
            Ok(mut values) => match values.remove(PREFERENCES_KEY) {
                Some(wire) => Preferences::from_wire(&wire).unwrap_or_else(|e| {
                    warn!(error = %e, "Stored preferences unreadable, using defaults");
                    Preferences::default()
                }),
                None => Preferences::default(),
            },
            Err(e) => {
                warn!(error = %e, "Failed to read stored preferences");
                Preferences::default()
            }
        }
    }

    fn save_preferences(&mut self, prefs: &Preferences) {
        let entries = BTreeMap::from([(PREFERENCES_KEY.to_string(), prefs.to_wire())]);
        if let Err(e) = self.durable.set(entries) {
            warn!(error = %e, "Failed to persist preferences");
        }
    }

    /// Ask the target page for its status while the state is unknown
    async fn refresh_status(&mut self) {
        debug!(state = %self.machine.state(), "refresh_status: called");
        if self.machine.state() != RunState::Unknown {
            return;
        }
        let Some(page) = self.target_page().await else {
            debug!("refresh_status: no page connected");
            return;
        };

        match self.pages.request(&page, Envelope::new(MessageId::BotStatusQuery)).await {
            Ok(answer) => match self.machine.observe_status(&StatusReply::parse(&answer)) {
                Ok(state) => {
                    info!(%page, %state, "Page reported status");
                    self.push_run_state();
                }
                Err(e) => self.transition_failed(e).await,
            },
            Err(e) => warn!(%page, error = %e, "Status query failed"),
        }
    }

    /// Apply the pre-run guard; `false` means the request is refused
    fn guard(&mut self, prefs: &Preferences) -> bool {
        match run_guard(prefs) {
            Ok(()) => {
                self.machine.unblock();
                true
            }
            Err(blocked) => {
                info!(reason = blocked.reason, "Run refused by preferences");
                self.machine.block(blocked.reason);
                false
            }
        }
    }

    // === Surface handlers ===

    async fn handle_refresh(&mut self) -> Option<Value> {
        debug!("handle_refresh: called");
        self.machine.reset();
        self.push_run_state();
        self.refresh_status().await;
        Some(self.run_state_reply())
    }

    async fn handle_run(&mut self, envelope: &Envelope) -> Option<Value> {
        debug!("handle_run: called");
        let prefs = self.preferences_from(envelope)?;
        if !self.guard(&prefs) {
            self.push_run_state();
            return Some(self.run_state_reply());
        }

        if let Err(e) = self.machine.begin_setup() {
            self.transition_failed(e).await;
            return Some(self.run_state_reply());
        }
        self.push_run_state();

        let failure = match self.target_page().await {
            None => Some(NO_PAGE.to_string()),
            Some(page) => {
                let inject = Envelope::with_data(MessageId::BotInject, prefs.to_wire());
                match self.pages.request(&page, inject).await {
                    Ok(answer) => match InjectReply::parse(&answer) {
                        InjectReply::Injected => None,
                        InjectReply::Failed(reason) => Some(reason),
                        InjectReply::Malformed(value) => Some(format!("Malformed injection result: {}", value)),
                    },
                    Err(e) => Some(e.to_string()),
                }
            }
        };

        let transition = match &failure {
            None => self.machine.injection_succeeded(),
            Some(reason) => self.machine.injection_failed(reason.clone()),
        };
        if let Err(e) = transition {
            self.transition_failed(e).await;
        } else if let Some(reason) = failure {
            self.record_failure(&reason).await;
        }
        self.push_run_state();
        Some(self.run_state_reply())
    }

    async fn handle_toggle(&mut self, envelope: &Envelope) -> Option<Value> {
        debug!("handle_toggle: called");
        let prefs = self.preferences_from(envelope)?;
        if !self.guard(&prefs) {
            self.push_run_state();
            return Some(self.run_state_reply());
        }

        if !self.machine.accepts_toggle() {
            let from = self.machine.state();
            self.transition_failed(TransitionError::Illegal { from, event: "toggle" })
                .await;
            return Some(self.run_state_reply());
        }

        let result = match self.target_page().await {
            None => self.machine.toggle_unanswered(NO_PAGE),
            Some(page) => match self.pages.request(&page, Envelope::new(MessageId::BotToggle)).await {
                Ok(answer) => self.machine.apply_toggle(&ToggleReply::parse(&answer)).map(|_| ()),
                Err(e) => self.machine.toggle_unanswered(e.to_string()),
            },
        };
        if let Err(e) = result {
            self.transition_failed(e).await;
        } else if self.machine.state() == RunState::Error {
            let reason = self.machine.cannot_run_reason().unwrap_or_default();
            self.record_failure(&reason).await;
        }
        self.push_run_state();
        Some(self.run_state_reply())
    }

    async fn handle_get_everything(&self) -> Option<Value> {
        debug!("handle_get_everything: called");
        match self.engine.get_everything().await {
            Ok(snapshot) => Some(json!(snapshot)),
            Err(e) => {
                warn!(error = %e, "Failed to read session snapshot");
                None
            }
        }
    }

    async fn handle_clear_unseen(&self, envelope: &Envelope) -> Option<Value> {
        let request: ClearUnseenRequest = match envelope.data_as() {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "handle_clear_unseen: ignoring");
                return None;
            }
        };
        debug!(log_type = %request.log_type, "handle_clear_unseen: called");
        let result = self.engine.clear_unseen(request.log_type).await;
        self.after_write(result).map(|unseen| json!(unseen))
    }

    async fn handle_reset(&self) -> Option<Value> {
        debug!("handle_reset: called");
        match self.engine.reset().await {
            Ok(snapshot) => {
                self.push(Push::Badge(Badge::compute(&snapshot.unseen, LogType::Event)));
                Some(json!(snapshot))
            }
            Err(e) => {
                warn!(error = %e, "Failed to reset session");
                None
            }
        }
    }

    async fn handle_sync_preferences(&mut self, envelope: &Envelope) -> Option<Value> {
        debug!("handle_sync_preferences: called");
        if envelope.data.is_none() {
            debug!("handle_sync_preferences: no preferences, ignoring");
            return None;
        }
        let prefs = self.preferences_from(envelope)?;
        let sync = Envelope::with_data(MessageId::BotSyncPreferences, prefs.to_wire());
        let report = relay(self.pages.as_ref(), &sync).await;
        info!(
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            "Preferences relayed to pages"
        );
        Some(json!(report))
    }

    // === Page handlers ===

    async fn handle_hello(&mut self, envelope: &Envelope) -> Option<Value> {
        let hello: PageHello = envelope.data_as().unwrap_or_default();
        debug!(page_id = ?hello.page_id, "handle_hello: called");
        self.refresh_status().await;
        Some(json!(Ack::ok()))
    }

    async fn handle_event(&self, envelope: &Envelope) -> Option<Value> {
        let event: DomainEvent = match envelope.data_as() {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed page event");
                return None;
            }
        };
        debug!(event_type = %event.event_type, "handle_event: called");
        let result = self.engine.record_event(event).await;
        Some(json!(ack_for(self.after_write(result))))
    }

    async fn handle_warn(&self, envelope: &Envelope) -> Option<Value> {
        let report: WarnReport = match envelope.data_as() {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Dropping malformed page warning");
                return None;
            }
        };
        debug!("handle_warn: called");
        let result = self.engine.record_warn(report.message).await;
        Some(json!(ack_for(self.after_write(result))))
    }

    async fn handle_error(&self, envelope: &Envelope) -> Option<Value> {
        let report: ErrorReport = match envelope.data_as() {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Dropping malformed page error");
                return None;
            }
        };
        debug!(is_critical = report.is_critical, "handle_error: called");
        let result = self.engine.record_error(report.message, report.is_critical).await;
        Some(json!(ack_for(self.after_write(result))))
    }
}

fn ack_for(written: Option<Unseen>) -> Ack {
    match written {
        Some(_) => Ack::ok(),
        None => Ack::failed("failed to record"),
    }
}
