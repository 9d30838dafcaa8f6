//! Audit event types and broadcast bus
//!
//! Every mutation of scope-owned data produces an `AuditEvent`. The engine
//! writes the event to the `audit_events` table inside the mutation's
//! transaction, then broadcasts it on the `EventBus` after commit so that
//! external sinks (notifications, audit log shipping) can follow along.

use crate::models::{ScopeRole, Visibility, WorkflowStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Structured audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// New curation created in `entry`
    CurationCreated {
        curation_id: Uuid,
        scope_id: Uuid,
        gene_id: String,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Workflow stage changed
    StageTransitioned {
        curation_id: Uuid,
        scope_id: Uuid,
        from: WorkflowStage,
        to: WorkflowStage,
        actor_id: Uuid,
        /// Version after the transition
        lock_version: i64,
        /// Distinct reviewers counted toward the review requirement
        reviewers: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// Evidence item added or edited
    EvidenceUpserted {
        curation_id: Uuid,
        scope_id: Uuid,
        item_id: Uuid,
        category: String,
        actor_id: Uuid,
        lock_version: i64,
        timestamp: DateTime<Utc>,
    },

    /// Evidence item removed
    EvidenceRemoved {
        curation_id: Uuid,
        scope_id: Uuid,
        item_id: Uuid,
        actor_id: Uuid,
        lock_version: i64,
        timestamp: DateTime<Utc>,
    },

    /// Reviewer signed off on the current review round
    ReviewApprovalRecorded {
        curation_id: Uuid,
        scope_id: Uuid,
        review_round: i64,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Previously current curation replaced by a newly activated one
    CurationSuperseded {
        curation_id: Uuid,
        scope_id: Uuid,
        superseded_by: Uuid,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    MembershipInvited {
        scope_id: Uuid,
        user_id: Uuid,
        role: ScopeRole,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    MembershipAccepted {
        scope_id: Uuid,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    MembershipDeactivated {
        scope_id: Uuid,
        user_id: Uuid,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Scope visibility or active flag changed
    ScopeUpdated {
        scope_id: Uuid,
        visibility: Visibility,
        is_active: bool,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Event type name stored in `audit_events.event_type`
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::CurationCreated { .. } => "CurationCreated",
            AuditEvent::StageTransitioned { .. } => "StageTransitioned",
            AuditEvent::EvidenceUpserted { .. } => "EvidenceUpserted",
            AuditEvent::EvidenceRemoved { .. } => "EvidenceRemoved",
            AuditEvent::ReviewApprovalRecorded { .. } => "ReviewApprovalRecorded",
            AuditEvent::CurationSuperseded { .. } => "CurationSuperseded",
            AuditEvent::MembershipInvited { .. } => "MembershipInvited",
            AuditEvent::MembershipAccepted { .. } => "MembershipAccepted",
            AuditEvent::MembershipDeactivated { .. } => "MembershipDeactivated",
            AuditEvent::ScopeUpdated { .. } => "ScopeUpdated",
        }
    }

    /// Owning scope; every audited mutation is scope-owned
    pub fn scope_id(&self) -> Uuid {
        match self {
            AuditEvent::CurationCreated { scope_id, .. }
            | AuditEvent::StageTransitioned { scope_id, .. }
            | AuditEvent::EvidenceUpserted { scope_id, .. }
            | AuditEvent::EvidenceRemoved { scope_id, .. }
            | AuditEvent::ReviewApprovalRecorded { scope_id, .. }
            | AuditEvent::CurationSuperseded { scope_id, .. }
            | AuditEvent::MembershipInvited { scope_id, .. }
            | AuditEvent::MembershipAccepted { scope_id, .. }
            | AuditEvent::MembershipDeactivated { scope_id, .. }
            | AuditEvent::ScopeUpdated { scope_id, .. } => *scope_id,
        }
    }

    pub fn curation_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::CurationCreated { curation_id, .. }
            | AuditEvent::StageTransitioned { curation_id, .. }
            | AuditEvent::EvidenceUpserted { curation_id, .. }
            | AuditEvent::EvidenceRemoved { curation_id, .. }
            | AuditEvent::ReviewApprovalRecorded { curation_id, .. }
            | AuditEvent::CurationSuperseded { curation_id, .. } => Some(*curation_id),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditEvent::CurationCreated { timestamp, .. }
            | AuditEvent::StageTransitioned { timestamp, .. }
            | AuditEvent::EvidenceUpserted { timestamp, .. }
            | AuditEvent::EvidenceRemoved { timestamp, .. }
            | AuditEvent::ReviewApprovalRecorded { timestamp, .. }
            | AuditEvent::CurationSuperseded { timestamp, .. }
            | AuditEvent::MembershipInvited { timestamp, .. }
            | AuditEvent::MembershipAccepted { timestamp, .. }
            | AuditEvent::MembershipDeactivated { timestamp, .. }
            | AuditEvent::ScopeUpdated { timestamp, .. } => *timestamp,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Broadcast bus for committed audit events
///
/// Uses `tokio::sync::broadcast`: publishing never blocks, slow subscribers
/// observe `Lagged` instead of stalling the writer.
///
/// # Examples
///
/// ```
/// use gcur_common::events::EventBus;
///
/// let bus = EventBus::new(100);
/// let _rx = bus.subscribe();
/// assert_eq!(bus.capacity(), 100);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuditEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// The durable copy is already in `audit_events`, so a missing listener
    /// loses nothing.
    pub fn emit_lossy(&self, event: AuditEvent) {
        if self.tx.send(event).is_err() {
            trace!("No audit subscribers listening");
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition_event() -> AuditEvent {
        AuditEvent::StageTransitioned {
            curation_id: Uuid::new_v4(),
            scope_id: Uuid::new_v4(),
            from: WorkflowStage::Review,
            to: WorkflowStage::Active,
            actor_id: Uuid::new_v4(),
            lock_version: 7,
            reviewers: vec![],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(transition_event()).unwrap();
        assert_eq!(json["type"], "StageTransitioned");
        assert_eq!(json["from"], "review");
        assert_eq!(json["to"], "active");
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = transition_event();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
    }

    #[test]
    fn test_membership_events_have_no_curation() {
        let event = AuditEvent::MembershipAccepted {
            scope_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        assert!(event.curation_id().is_none());
    }

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let event = transition_event();
        bus.emit_lossy(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers_does_not_fail() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(transition_event());
    }
}
