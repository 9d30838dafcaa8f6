//! Shared data model
//!
//! Scopes are isolation boundaries (one curating institution or consortium).
//! Users hold exactly one application-wide role; authority inside a scope
//! comes only from an accepted, active membership.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generates `as_str` plus `FromStr`/`Display` for unit enums stored as TEXT.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Database / wire representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Application-wide role. Admins bypass scope checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Admin,
    User,
}

text_enum!(AppRole { Admin => "admin", User => "user" });

/// The caller of every core operation
///
/// There is no implicit "current user": each call receives an `Actor`.
/// Unauthenticated callers are `Anonymous` and can only read public scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Anonymous,
    User { id: Uuid, role: AppRole },
}

impl Actor {
    pub fn user(id: Uuid, role: AppRole) -> Self {
        Actor::User { id, role }
    }

    /// Service account for background jobs
    ///
    /// The id must belong to a registered user with the admin application
    /// role so that audit rows point at a real account.
    pub fn system(id: Uuid) -> Self {
        Actor::User {
            id,
            role: AppRole::Admin,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::Anonymous => None,
            Actor::User { id, .. } => Some(*id),
        }
    }

    pub fn is_app_admin(&self) -> bool {
        matches!(
            self,
            Actor::User {
                role: AppRole::Admin,
                ..
            }
        )
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Anonymous => f.write_str("anonymous"),
            Actor::User { id, role } => write!(f, "{}({})", id, role),
        }
    }
}

/// Registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: AppRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor::user(self.id, self.role)
    }
}

/// Scope visibility. Public scope data is readable by anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

text_enum!(Visibility { Public => "public", Private => "private" });

/// Isolation boundary (institution or consortium)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub id: Uuid,
    pub name: String,
    pub visibility: Visibility,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Role held inside a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRole {
    Admin,
    Curator,
    Reviewer,
    Viewer,
}

text_enum!(ScopeRole {
    Admin => "admin",
    Curator => "curator",
    Reviewer => "reviewer",
    Viewer => "viewer",
});

/// (scope, user, role) grant with invitation lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub scope_id: Uuid,
    pub user_id: Uuid,
    pub role: ScopeRole,
    pub invited_by: Option<Uuid>,
    pub invited_at: DateTime<Utc>,
    /// `None` while the invitation is pending
    pub accepted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Membership {
    /// Only accepted, active memberships carry authority
    pub fn grants_access(&self) -> bool {
        self.is_active && self.accepted_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.is_active && self.accepted_at.is_none()
    }
}

/// Curation lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Entry,
    Precuration,
    Curation,
    Review,
    Active,
}

text_enum!(WorkflowStage {
    Entry => "entry",
    Precuration => "precuration",
    Curation => "curation",
    Review => "review",
    Active => "active",
});

impl WorkflowStage {
    /// Stages in which curators may edit evidence
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            WorkflowStage::Entry | WorkflowStage::Precuration | WorkflowStage::Curation
        )
    }
}

/// Outcome of the last evidence recomputation stored on the curation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    /// No evidence recorded yet
    Pending,
    /// Evidence set was complete and scored
    Scored,
    /// Evidence set failed set-level validation; score is absent
    Incomplete,
}

text_enum!(ScoreStatus {
    Pending => "pending",
    Scored => "scored",
    Incomplete => "incomplete",
});

/// Work item under review
///
/// `score`, `classification` and `score_detail` are derived from the evidence
/// items and never set directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curation {
    pub id: Uuid,
    pub scope_id: Uuid,
    pub gene_id: String,
    pub workflow_pair: Option<String>,
    pub schema_id: Option<String>,
    pub creator_id: Uuid,
    pub stage: WorkflowStage,
    pub lock_version: i64,
    /// Set only on the active record a finalize made current for its gene
    pub is_current: bool,
    pub evidence_frozen: bool,
    pub review_round: i64,
    pub score: Option<f64>,
    pub classification: Option<String>,
    pub score_status: ScoreStatus,
    pub score_detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
