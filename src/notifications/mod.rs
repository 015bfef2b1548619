// ============================================================================
// Notifications - per-viewer alerting on top of the order event stream
// ============================================================================
//
// - debouncer/   - pure Idle → Armed → Cooldown state machine
// - preferences/ - sound and highlight toggles, persisted per session
// - session/     - actix actor tying a subscription to one debouncer
//
// ============================================================================

mod debouncer;
mod preferences;
mod session;

pub use debouncer::{Alert, DebounceSettings, Expiry, NotificationDebouncer, Phase};
pub use preferences::{AlertPreferences, JsonFilePreferenceStore, PreferenceError, PreferenceStore};
pub use session::{
    AlertSink, GetSessionState, LogAlertSink, Reconcile, SeedBaseline, SessionState, ToggleHighlight,
    ToggleSound, ViewerSession,
};
