use std::sync::Arc;
use std::time::Instant;

use actix::prelude::*;
use uuid::Uuid;

use super::debouncer::{Alert, DebounceSettings, Expiry, NotificationDebouncer};
use super::preferences::{AlertPreferences, PreferenceError, PreferenceStore};
use crate::broadcast::Subscription;
use crate::domain::order::{OrderCode, OrderEvent, OrderSnapshot};
use crate::metrics::Metrics;

// ============================================================================
// Viewer Session Actor - one connected dashboard or display
// ============================================================================
//
// Owns the session's debouncer and its single expiry timer. Events arrive
// through the broadcaster subscription attached in `started`; every state
// change reschedules the timer, cancelling the previous one first. Toggles
// take effect only once the preference store has saved them.
//
// ============================================================================

/// Where a session's alerts end up (speaker and screen for a real viewer).
pub trait AlertSink: Send + Sync {
    fn alert(&self, session_id: &str, alert: &Alert);
    fn highlight_cleared(&self, session_id: &str);
}

/// Writes alerts to the log, for an operator watching the server console.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, session_id: &str, alert: &Alert) {
        let codes: Vec<&str> = alert.highlight.iter().map(OrderCode::as_str).collect();
        tracing::info!(session_id, sound = alert.sound, highlight = ?codes, "🔔 New order");
    }

    fn highlight_cleared(&self, session_id: &str) {
        tracing::debug!(session_id, "Highlight cleared");
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Orders the viewer already has on screen when it connects.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SeedBaseline(pub Vec<Uuid>);

/// Full list fetched after a reconnect; new orders alert as one batch.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Reconcile(pub Vec<OrderSnapshot>);

#[derive(Message)]
#[rtype(result = "Result<AlertPreferences, PreferenceError>")]
pub struct ToggleSound;

#[derive(Message)]
#[rtype(result = "Result<AlertPreferences, PreferenceError>")]
pub struct ToggleHighlight;

#[derive(Message)]
#[rtype(result = "SessionState")]
pub struct GetSessionState;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session_id: String,
    pub phase: &'static str,
    pub highlighted: Vec<OrderCode>,
    pub preferences: AlertPreferences,
}

// ============================================================================
// Viewer Session
// ============================================================================

pub struct ViewerSession {
    session_id: String,
    debouncer: NotificationDebouncer,
    events: Option<Subscription>,
    sink: Arc<dyn AlertSink>,
    preference_store: Arc<dyn PreferenceStore>,
    metrics: Arc<Metrics>,
    timer: Option<SpawnHandle>,
}

impl ViewerSession {
    /// Loads the session's saved preferences and starts the actor on the
    /// current arbiter.
    pub async fn connect(
        session_id: impl Into<String>,
        events: Subscription,
        settings: DebounceSettings,
        preference_store: Arc<dyn PreferenceStore>,
        sink: Arc<dyn AlertSink>,
        metrics: Arc<Metrics>,
    ) -> Result<Addr<Self>, PreferenceError> {
        let session_id = session_id.into();
        let preferences = preference_store.load(&session_id).await?;

        Ok(Self {
            debouncer: NotificationDebouncer::new(settings, preferences),
            session_id,
            events: Some(events),
            sink,
            preference_store,
            metrics,
            timer: None,
        }
        .start())
    }

    fn surface(&mut self, alert: Option<Alert>, ctx: &mut Context<Self>) {
        if let Some(alert) = alert {
            self.metrics.alerts_raised.inc();
            self.sink.alert(&self.session_id, &alert);
        }
        self.reschedule(ctx);
    }

    fn reschedule(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.timer.take() {
            ctx.cancel_future(handle);
        }
        let Some(deadline) = self.debouncer.next_deadline() else {
            return;
        };

        let delay = deadline.saturating_duration_since(Instant::now());
        self.timer = Some(ctx.run_later(delay, |act, ctx| {
            act.timer = None;
            if act.debouncer.tick(Instant::now()) == Some(Expiry::HighlightCleared) {
                act.sink.highlight_cleared(&act.session_id);
            }
            act.reschedule(ctx);
        }));
    }

    /// Saves `preferences`; nothing changes in the session until the save
    /// succeeded. Toggles queue behind one another while a save is running.
    fn save_then_apply(
        &self,
        preferences: AlertPreferences,
    ) -> AtomicResponse<Self, Result<AlertPreferences, PreferenceError>> {
        let store = self.preference_store.clone();
        let session_id = self.session_id.clone();

        AtomicResponse::new(Box::pin(
            async move {
                store.save(&session_id, &preferences).await?;
                Ok::<_, PreferenceError>(preferences)
            }
            .into_actor(self)
            .map(|saved, act: &mut Self, ctx: &mut Context<Self>| -> Result<AlertPreferences, PreferenceError> {
                let preferences = saved.inspect_err(|e| {
                    tracing::warn!(session_id = %act.session_id, error = %e, "Keeping previous alert preferences");
                })?;
                act.debouncer.set_sound(preferences.sound_enabled);
                if act.debouncer.preferences().highlight_enabled != preferences.highlight_enabled {
                    act.debouncer.set_highlight(preferences.highlight_enabled);
                    act.reschedule(ctx);
                }
                Ok(preferences)
            }),
        ))
    }
}

impl Actor for ViewerSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session_id, "ViewerSession started");
        if let Some(events) = self.events.take() {
            ctx.add_stream(events);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session_id, "ViewerSession stopped");
    }
}

impl StreamHandler<OrderEvent> for ViewerSession {
    fn handle(&mut self, event: OrderEvent, ctx: &mut Self::Context) {
        let alert = self.debouncer.observe(&event, Instant::now());
        self.surface(alert, ctx);
    }
}

impl Handler<SeedBaseline> for ViewerSession {
    type Result = ();

    fn handle(&mut self, msg: SeedBaseline, _: &mut Self::Context) {
        tracing::debug!(session_id = %self.session_id, known = msg.0.len(), "Seeded baseline");
        self.debouncer.seed_baseline(msg.0);
    }
}

impl Handler<Reconcile> for ViewerSession {
    type Result = ();

    fn handle(&mut self, msg: Reconcile, ctx: &mut Self::Context) {
        let alert = self.debouncer.reconcile(&msg.0, Instant::now());
        self.surface(alert, ctx);
    }
}

impl Handler<ToggleSound> for ViewerSession {
    type Result = AtomicResponse<Self, Result<AlertPreferences, PreferenceError>>;

    fn handle(&mut self, _: ToggleSound, _: &mut Self::Context) -> Self::Result {
        let mut next = self.debouncer.preferences();
        next.sound_enabled = !next.sound_enabled;
        self.save_then_apply(next)
    }
}

impl Handler<ToggleHighlight> for ViewerSession {
    type Result = AtomicResponse<Self, Result<AlertPreferences, PreferenceError>>;

    fn handle(&mut self, _: ToggleHighlight, _: &mut Self::Context) -> Self::Result {
        let mut next = self.debouncer.preferences();
        next.highlight_enabled = !next.highlight_enabled;
        self.save_then_apply(next)
    }
}

impl Handler<GetSessionState> for ViewerSession {
    type Result = MessageResult<GetSessionState>;

    fn handle(&mut self, _: GetSessionState, _: &mut Self::Context) -> Self::Result {
        MessageResult(SessionState {
            session_id: self.session_id.clone(),
            phase: self.debouncer.phase().name(),
            highlighted: self.debouncer.highlighted().to_vec(),
            preferences: self.debouncer.preferences(),
        })
    }
}
