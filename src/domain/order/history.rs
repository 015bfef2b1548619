use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{OrderStatus, Operator};

// ============================================================================
// Audit Trail - append-only status history of one order
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub id: Uuid,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Operator>,
}

impl TransitionRecord {
    /// The system-generated `received -> received` entry written at creation.
    pub fn anchor(created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            previous_status: OrderStatus::Received,
            new_status: OrderStatus::Received,
            note: None,
            created_at,
            actor: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.previous_status == self.new_status
    }
}

/// A break in the `new_status -> previous_status` chain, or a timestamp that
/// does not strictly increase.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainBreak {
    #[error("entry {index} starts at {found} but the previous entry ended at {expected}")]
    Status {
        index: usize,
        expected: OrderStatus,
        found: OrderStatus,
    },
    #[error("entry {index} is not later than its predecessor")]
    Timestamp { index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<TransitionRecord>);

impl AuditTrail {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a trail from stored rows, sorting ascending by `created_at`.
    pub fn from_entries(mut entries: Vec<TransitionRecord>) -> Self {
        entries.sort_by_key(|entry| entry.created_at);
        Self(entries)
    }

    pub fn entries(&self) -> &[TransitionRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.0.last()
    }

    pub(crate) fn push(&mut self, record: TransitionRecord) {
        self.0.push(record);
    }

    /// Timestamp for the next entry. Truncated to microseconds so that it
    /// survives a round trip through PostgreSQL, and bumped past the last
    /// entry when the clock has not moved.
    pub fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(6);
        match self.last() {
            Some(last) if now <= last.created_at => last.created_at + Duration::microseconds(1),
            _ => now,
        }
    }

    pub fn statuses(&self) -> Vec<(OrderStatus, OrderStatus)> {
        self.0
            .iter()
            .map(|entry| (entry.previous_status, entry.new_status))
            .collect()
    }

    pub fn verify_chain(&self) -> Result<(), ChainBreak> {
        for (index, pair) in self.0.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.new_status != next.previous_status {
                return Err(ChainBreak::Status {
                    index: index + 1,
                    expected: prev.new_status,
                    found: next.previous_status,
                });
            }
            if next.created_at <= prev.created_at {
                return Err(ChainBreak::Timestamp { index: index + 1 });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prev: OrderStatus, next: OrderStatus, at: DateTime<Utc>) -> TransitionRecord {
        TransitionRecord {
            id: Uuid::new_v4(),
            previous_status: prev,
            new_status: next,
            note: None,
            created_at: at,
            actor: None,
        }
    }

    #[test]
    fn test_from_entries_sorts_by_timestamp() {
        let t0 = Utc::now();
        let trail = AuditTrail::from_entries(vec![
            entry(OrderStatus::Received, OrderStatus::InPreparation, t0 + Duration::seconds(2)),
            TransitionRecord::anchor(t0),
        ]);

        assert!(trail.entries()[0].is_noop());
        assert_eq!(trail.entries()[1].new_status, OrderStatus::InPreparation);
        assert!(trail.verify_chain().is_ok());
    }

    #[test]
    fn test_verify_chain_detects_status_gap() {
        let t0 = Utc::now();
        let trail = AuditTrail::from_entries(vec![
            TransitionRecord::anchor(t0),
            entry(OrderStatus::Ready, OrderStatus::Delivered, t0 + Duration::seconds(1)),
        ]);

        assert_eq!(
            trail.verify_chain(),
            Err(ChainBreak::Status {
                index: 1,
                expected: OrderStatus::Received,
                found: OrderStatus::Ready,
            })
        );
    }

    #[test]
    fn test_verify_chain_detects_equal_timestamps() {
        let t0 = Utc::now();
        let trail = AuditTrail::from_entries(vec![
            TransitionRecord::anchor(t0),
            entry(OrderStatus::Received, OrderStatus::Ready, t0),
        ]);

        assert_eq!(trail.verify_chain(), Err(ChainBreak::Timestamp { index: 1 }));
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let t0 = Utc::now().trunc_subsecs(6);
        let mut trail = AuditTrail::new();
        trail.push(TransitionRecord::anchor(t0));

        let next = trail.next_timestamp(t0);
        assert_eq!(next, t0 + Duration::microseconds(1));

        let later = t0 + Duration::seconds(3);
        assert_eq!(trail.next_timestamp(later), later);
    }

    #[test]
    fn test_serialized_shape() {
        let record = TransitionRecord::anchor(Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["previousStatus"], "received");
        assert_eq!(json["newStatus"], "received");
        assert!(json.get("actor").is_none());
        assert!(json.get("note").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
