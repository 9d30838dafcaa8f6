//! Access Control Evaluator
//!
//! `authorize` is a pure function over the actor, the scope, and the actor's
//! membership row. The store-backed wrappers in `evaluator` load those rows
//! fresh on every call; authorization decisions are never cached across
//! requests, so a deactivated membership stops working on the very next call.
//!
//! # Capability mapping
//!
//! | scope role | read | curate | review | administer |
//! |------------|------|--------|--------|------------|
//! | admin      | yes  | yes    | yes    | yes        |
//! | curator    | yes  | yes    |        |            |
//! | reviewer   | yes  |        | yes    |            |
//! | viewer     | yes  |        |        |            |
//!
//! Application admins bypass the table entirely. Public scopes are readable by
//! anyone, including anonymous callers, but never writable without membership.

pub mod evaluator;

pub use evaluator::{authorize_in_store, read_filter};

use crate::error::DenyReason;
use gcur_common::{Actor, Membership, Scope, ScopeRole, Visibility};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;
use uuid::Uuid;

/// Capability granted by a scope role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Curate,
    Review,
    Administer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Read => "read",
            Capability::Curate => "curate",
            Capability::Review => "review",
            Capability::Administer => "administer",
        })
    }
}

/// Capabilities held by a scope role
pub fn role_capabilities(role: ScopeRole) -> &'static [Capability] {
    match role {
        ScopeRole::Admin => &[
            Capability::Read,
            Capability::Curate,
            Capability::Review,
            Capability::Administer,
        ],
        ScopeRole::Curator => &[Capability::Read, Capability::Curate],
        ScopeRole::Reviewer => &[Capability::Read, Capability::Review],
        ScopeRole::Viewer => &[Capability::Read],
    }
}

/// Requested operation against a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    CreateCuration,
    EditEvidence,
    /// Curator-controlled stage edge
    AdvanceStage,
    /// Edge out of `review`, or a review sign-off
    ReviewStage,
    ManageMembers,
    ConfigureScope,
}

impl Action {
    pub fn required_capability(&self) -> Capability {
        match self {
            Action::Read => Capability::Read,
            Action::CreateCuration | Action::EditEvidence | Action::AdvanceStage => {
                Capability::Curate
            }
            Action::ReviewStage => Capability::Review,
            Action::ManageMembers | Action::ConfigureScope => Capability::Administer,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Action::Read)
    }
}

/// Authorization outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert into a `Result` for `?` propagation
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Decide whether `actor` may perform `action` in `scope`
///
/// `scope` is `None` when the scope does not exist; `membership` is the
/// actor's most recent membership row for the scope (pending, deactivated or
/// live). Denials for private scopes the actor does not belong to always use
/// `NotVisible` so a caller cannot probe for scope existence.
pub fn authorize(
    actor: &Actor,
    scope: Option<&Scope>,
    membership: Option<&Membership>,
    action: Action,
) -> Decision {
    if actor.is_app_admin() {
        return Decision::Allow;
    }

    let Some(scope) = scope else {
        return Decision::Deny(DenyReason::NotVisible);
    };
    let public = scope.visibility == Visibility::Public;

    if action == Action::Read && public {
        return Decision::Allow;
    }

    let Some(user_id) = actor.user_id() else {
        return Decision::Deny(if public {
            DenyReason::Anonymous
        } else {
            DenyReason::NotVisible
        });
    };

    let membership = membership.filter(|m| {
        m.grants_access() && m.user_id == user_id && m.scope_id == scope.id
    });
    let Some(membership) = membership else {
        return Decision::Deny(if public {
            DenyReason::NoMembership
        } else {
            DenyReason::NotVisible
        });
    };

    if action.is_write() && !scope.is_active {
        return Decision::Deny(DenyReason::ScopeInactive);
    }

    let required = action.required_capability();
    if role_capabilities(membership.role).contains(&required) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole {
            role: membership.role,
            required,
        })
    }
}

/// Row filter for scope-owned reads
///
/// Produced by `read_filter` for one request and applied inside the SQL
/// query, so rows the actor cannot read never leave the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadFilter {
    /// Application admin: every scope
    Unrestricted,
    /// Public scopes plus the scopes with an accepted, active membership
    Restricted { member_scopes: Vec<Uuid> },
}

impl ReadFilter {
    pub fn permits(&self, scope: &Scope) -> bool {
        match self {
            ReadFilter::Unrestricted => true,
            ReadFilter::Restricted { member_scopes } => {
                scope.visibility == Visibility::Public || member_scopes.contains(&scope.id)
            }
        }
    }

    /// Append the filter as a boolean SQL expression
    ///
    /// `scope_id_column` and `visibility_column` name the columns of the
    /// already-joined scope in the surrounding query.
    pub fn push_predicate(
        &self,
        qb: &mut QueryBuilder<'_, Sqlite>,
        scope_id_column: &str,
        visibility_column: &str,
    ) {
        match self {
            ReadFilter::Unrestricted => {
                qb.push("1 = 1");
            }
            ReadFilter::Restricted { member_scopes } => {
                qb.push("(");
                qb.push(visibility_column);
                qb.push(" = 'public'");
                if !member_scopes.is_empty() {
                    qb.push(" OR ");
                    qb.push(scope_id_column);
                    qb.push(" IN (");
                    let mut separated = qb.separated(", ");
                    for scope_id in member_scopes {
                        separated.push_bind(scope_id.to_string());
                    }
                    separated.push_unseparated(")");
                }
                qb.push(")");
            }
        }
    }
}
