use std::collections::HashSet;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::preferences::AlertPreferences;
use crate::domain::order::{OrderCode, OrderEvent, OrderSnapshot};

// ============================================================================
// Notification Debouncer - per-viewer alert state machine
// ============================================================================
//
//   Idle --new order--> Armed --window elapsed--> Cooldown --cooldown--> Idle
//                         ^                          |
//                         +-------new order----------+
//
// Time is passed in by the caller so the machine stays deterministic; the
// owning session schedules exactly one wake-up at `next_deadline()`.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceSettings {
    pub highlight_window: Duration,
    pub cooldown: Duration,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            highlight_window: Duration::from_secs(5),
            cooldown: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed { until: Instant },
    Cooldown { until: Instant },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Armed { .. } => "armed",
            Phase::Cooldown { .. } => "cooldown",
        }
    }
}

/// What a viewer should perceive for a batch of newly seen orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub sound: bool,
    /// Codes to highlight; empty when highlighting is switched off.
    pub highlight: Vec<OrderCode>,
}

/// Outcome of a timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    HighlightCleared,
    CooldownOver,
}

pub struct NotificationDebouncer {
    settings: DebounceSettings,
    preferences: AlertPreferences,
    known: HashSet<Uuid>,
    baseline_taken: bool,
    phase: Phase,
    highlighted: Vec<OrderCode>,
}

impl NotificationDebouncer {
    pub fn new(settings: DebounceSettings, preferences: AlertPreferences) -> Self {
        Self {
            settings,
            preferences,
            known: HashSet::new(),
            baseline_taken: false,
            phase: Phase::Idle,
            highlighted: Vec::new(),
        }
    }

    /// Marks `ids` as already seen. Never alerts.
    pub fn seed_baseline(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        self.known.extend(ids);
        self.baseline_taken = true;
    }

    /// Feeds one broadcast event. Without an explicit baseline the first
    /// event only establishes it.
    pub fn observe(&mut self, event: &OrderEvent, now: Instant) -> Option<Alert> {
        self.observe_orders(std::iter::once(event.snapshot()), now)
    }

    /// Diffs a full order list (e.g. a refetch after reconnecting) against
    /// the known set; all new orders surface as one alert.
    pub fn reconcile(&mut self, orders: &[OrderSnapshot], now: Instant) -> Option<Alert> {
        self.observe_orders(orders.iter(), now)
    }

    fn observe_orders<'a>(
        &mut self,
        orders: impl Iterator<Item = &'a OrderSnapshot>,
        now: Instant,
    ) -> Option<Alert> {
        let fresh: Vec<OrderCode> = orders
            .filter(|order| self.known.insert(order.id))
            .map(|order| order.code.clone())
            .collect();

        if !self.baseline_taken {
            self.baseline_taken = true;
            return None;
        }
        if fresh.is_empty() {
            return None;
        }

        let highlight = if self.preferences.highlight_enabled {
            // Replaces whatever is lit and restarts the single window.
            self.highlighted = fresh;
            self.phase = Phase::Armed {
                until: now + self.settings.highlight_window,
            };
            self.highlighted.clone()
        } else {
            Vec::new()
        };

        if !self.preferences.sound_enabled && highlight.is_empty() {
            return None;
        }
        Some(Alert {
            sound: self.preferences.sound_enabled,
            highlight,
        })
    }

    /// Advances timers. A call before the current deadline does nothing, so
    /// a wake-up scheduled for a window that has since been reset is harmless.
    pub fn tick(&mut self, now: Instant) -> Option<Expiry> {
        match self.phase {
            Phase::Armed { until } if now >= until => {
                self.highlighted.clear();
                self.phase = Phase::Cooldown {
                    until: until + self.settings.cooldown,
                };
                Some(Expiry::HighlightCleared)
            }
            Phase::Cooldown { until } if now >= until => {
                self.phase = Phase::Idle;
                Some(Expiry::CooldownOver)
            }
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::Armed { until } | Phase::Cooldown { until } => Some(until),
        }
    }

    pub fn set_sound(&mut self, enabled: bool) {
        self.preferences.sound_enabled = enabled;
    }

    /// Switching highlighting off also clears what is currently lit.
    pub fn set_highlight(&mut self, enabled: bool) {
        self.preferences.highlight_enabled = enabled;
        if !enabled {
            self.highlighted.clear();
            self.phase = Phase::Idle;
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn highlighted(&self) -> &[OrderCode] {
        &self.highlighted
    }

    pub fn preferences(&self) -> AlertPreferences {
        self.preferences
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, PricedOrder};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order() -> OrderSnapshot {
        OrderSnapshot::open(
            Uuid::new_v4(),
            OrderCode::generate(),
            PricedOrder {
                customer_name: "Lia".to_string(),
                table_label: None,
                contact: None,
                items: vec![],
                total: Decimal::ZERO,
            },
            Utc::now(),
        )
    }

    fn debouncer() -> NotificationDebouncer {
        NotificationDebouncer::new(DebounceSettings::default(), AlertPreferences::default())
    }

    #[test]
    fn test_baseline_never_alerts() {
        let mut debouncer = debouncer();
        let existing = vec![order(), order()];
        debouncer.seed_baseline(existing.iter().map(|o| o.id));

        let now = Instant::now();
        for snapshot in &existing {
            assert_eq!(debouncer.observe(&OrderEvent::StatusChanged(snapshot.clone()), now), None);
        }
        assert_eq!(debouncer.phase(), Phase::Idle);
    }

    #[test]
    fn test_first_event_after_connect_is_the_baseline() {
        let mut debouncer = debouncer();
        let now = Instant::now();

        assert_eq!(debouncer.observe(&OrderEvent::Created(order()), now), None);

        let arrival = order();
        let alert = debouncer.observe(&OrderEvent::Created(arrival.clone()), now).unwrap();
        assert!(alert.sound);
        assert_eq!(alert.highlight, vec![arrival.code]);
    }

    #[test]
    fn test_each_new_order_alerts_exactly_once() {
        let mut debouncer = debouncer();
        debouncer.seed_baseline([]);
        let now = Instant::now();
        let mut arrival = order();

        assert!(debouncer.observe(&OrderEvent::Created(arrival.clone()), now).is_some());

        arrival.status = OrderStatus::InPreparation;
        assert_eq!(debouncer.observe(&OrderEvent::StatusChanged(arrival.clone()), now), None);
        assert_eq!(debouncer.observe(&OrderEvent::Created(arrival), now), None);
    }

    #[test]
    fn test_window_expires_then_cooldown_then_idle() {
        let mut debouncer = debouncer();
        debouncer.seed_baseline([]);
        let start = Instant::now();
        debouncer.observe(&OrderEvent::Created(order()), start).unwrap();

        let window_end = start + Duration::from_secs(5);
        assert_eq!(debouncer.next_deadline(), Some(window_end));
        assert_eq!(debouncer.tick(start + Duration::from_secs(4)), None);
        assert_eq!(debouncer.highlighted().len(), 1);

        assert_eq!(debouncer.tick(window_end), Some(Expiry::HighlightCleared));
        assert!(debouncer.highlighted().is_empty());
        assert_eq!(debouncer.phase().name(), "cooldown");

        assert_eq!(debouncer.tick(window_end + Duration::from_secs(1)), Some(Expiry::CooldownOver));
        assert_eq!(debouncer.phase(), Phase::Idle);
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_new_arrival_rearms_single_window() {
        let mut debouncer = debouncer();
        debouncer.seed_baseline([]);
        let start = Instant::now();
        debouncer.observe(&OrderEvent::Created(order()), start).unwrap();

        let later = start + Duration::from_secs(3);
        let second = order();
        debouncer.observe(&OrderEvent::Created(second.clone()), later).unwrap();

        // The old deadline is stale now.
        assert_eq!(debouncer.tick(start + Duration::from_secs(5)), None);
        assert_eq!(debouncer.highlighted(), &[second.code]);
        assert_eq!(debouncer.next_deadline(), Some(later + Duration::from_secs(5)));
    }

    #[test]
    fn test_arrival_during_cooldown_rearms() {
        let mut debouncer = debouncer();
        debouncer.seed_baseline([]);
        let start = Instant::now();
        debouncer.observe(&OrderEvent::Created(order()), start).unwrap();
        debouncer.tick(start + Duration::from_secs(5));
        assert_eq!(debouncer.phase().name(), "cooldown");

        let during = start + Duration::from_millis(5500);
        debouncer.observe(&OrderEvent::Created(order()), during).unwrap();
        assert_eq!(
            debouncer.phase(),
            Phase::Armed { until: during + Duration::from_secs(5) }
        );
    }

    #[test]
    fn test_reconcile_batches_new_orders_into_one_alert() {
        let mut debouncer = debouncer();
        let known = order();
        debouncer.seed_baseline([known.id]);

        let (a, b) = (order(), order());
        let alert = debouncer
            .reconcile(&[b.clone(), a.clone(), known], Instant::now())
            .unwrap();
        assert_eq!(alert.highlight, vec![b.code, a.code]);
    }

    #[test]
    fn test_toggles_are_independent() {
        let mut debouncer = debouncer();
        debouncer.seed_baseline([]);
        let now = Instant::now();

        debouncer.set_sound(false);
        let alert = debouncer.observe(&OrderEvent::Created(order()), now).unwrap();
        assert!(!alert.sound);
        assert_eq!(alert.highlight.len(), 1);

        debouncer.set_highlight(false);
        assert_eq!(debouncer.phase(), Phase::Idle);
        assert_eq!(debouncer.observe(&OrderEvent::Created(order()), now), None);

        debouncer.set_sound(true);
        let alert = debouncer.observe(&OrderEvent::Created(order()), now).unwrap();
        assert!(alert.sound);
        assert!(alert.highlight.is_empty());
        assert_eq!(debouncer.next_deadline(), None);
        assert_eq!(debouncer.known_count(), 3);
    }
}
