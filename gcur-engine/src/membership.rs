//! Membership Store operations, scopes and the user directory
//!
//! Invitations and deactivations need the `ManageMembers` capability (scope
//! admin) or an application admin. Only the invitee can accept. Every change
//! is visible to the very next authorization because nothing is cached.

use crate::access::Action;
use crate::error::{CurationError, DenyReason, Result};
use crate::isolation::ScopedRepository;
use crate::store;
use gcur_common::events::AuditEvent;
use gcur_common::models::User;
use gcur_common::{Actor, AppRole, Membership, Scope, ScopeRole, Visibility};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScope {
    pub name: String,
    pub visibility: Visibility,
}

/// Mutable scope attributes; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeUpdate {
    pub visibility: Option<Visibility>,
    pub is_active: Option<bool>,
}

fn require_app_admin(actor: &Actor) -> Result<Uuid> {
    match actor {
        Actor::Anonymous => Err(DenyReason::Anonymous.into()),
        Actor::User { id, role: AppRole::Admin } => Ok(*id),
        Actor::User { .. } => Err(DenyReason::AdminOnly.into()),
    }
}

fn acting_user(actor: &Actor) -> Result<Uuid> {
    actor
        .user_id()
        .ok_or(CurationError::Unauthorized(DenyReason::Anonymous))
}

fn validate_name(what: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CurationError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(name.to_string())
}

/// Create the first application admin of an empty store
pub async fn bootstrap_admin(conn: &mut SqliteConnection, username: &str) -> Result<User> {
    let username = validate_name("username", username)?;
    if store::users::count(&mut *conn).await? > 0 {
        return Err(CurationError::InvalidInput(
            "store already has users; bootstrap is only allowed once".to_string(),
        ));
    }
    let user = User {
        id: gcur_common::uuid_utils::generate(),
        username,
        role: AppRole::Admin,
        created_at: gcur_common::time::now(),
    };
    store::users::insert(conn, &user).await?;
    info!(user_id = %user.id, username = %user.username, "Bootstrapped application admin");
    Ok(user)
}

pub async fn create_user(
    conn: &mut SqliteConnection,
    actor: &Actor,
    username: &str,
    role: AppRole,
) -> Result<User> {
    require_app_admin(actor)?;
    let username = validate_name("username", username)?;
    if store::users::username_taken(&mut *conn, &username).await? {
        return Err(CurationError::InvalidInput(format!(
            "username '{}' is already taken",
            username
        )));
    }
    let user = User {
        id: gcur_common::uuid_utils::generate(),
        username,
        role,
        created_at: gcur_common::time::now(),
    };
    store::users::insert(conn, &user).await?;
    info!(user_id = %user.id, role = %user.role, actor = %actor, "User created");
    Ok(user)
}

/// Identity lookup: user id to `Actor`
pub async fn load_actor(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Actor> {
    store::users::load(conn, user_id)
        .await?
        .map(|user| user.actor())
        .ok_or_else(|| CurationError::NotFound(format!("user {}", user_id)))
}

pub async fn create_scope(
    conn: &mut SqliteConnection,
    actor: &Actor,
    new_scope: NewScope,
) -> Result<Scope> {
    let actor_id = require_app_admin(actor)?;
    let name = validate_name("scope name", &new_scope.name)?;
    if store::scopes::name_taken(&mut *conn, &name).await? {
        return Err(CurationError::InvalidInput(format!(
            "scope '{}' already exists",
            name
        )));
    }
    let scope = Scope {
        id: gcur_common::uuid_utils::generate(),
        name,
        visibility: new_scope.visibility,
        is_active: true,
        created_at: gcur_common::time::now(),
    };
    store::scopes::insert(conn, &scope, actor_id).await?;
    info!(scope_id = %scope.id, name = %scope.name, visibility = %scope.visibility, "Scope created");
    Ok(scope)
}

/// Change visibility and/or the active flag
///
/// Writes to an inactive scope are denied to scope admins too, so only an
/// application admin can reactivate one.
pub async fn update_scope(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    update: ScopeUpdate,
) -> Result<(Scope, AuditEvent)> {
    let repo = ScopedRepository::new(actor);
    repo.authorize(&mut *conn, scope_id, Action::ConfigureScope).await?;
    let actor_id = acting_user(actor)?;
    let mut scope = store::scopes::load(&mut *conn, scope_id)
        .await?
        .ok_or(CurationError::Unauthorized(DenyReason::NotVisible))?;

    if let Some(visibility) = update.visibility {
        scope.visibility = visibility;
    }
    if let Some(is_active) = update.is_active {
        scope.is_active = is_active;
    }

    let event = AuditEvent::ScopeUpdated {
        scope_id,
        visibility: scope.visibility,
        is_active: scope.is_active,
        actor_id,
        timestamp: gcur_common::time::now(),
    };
    let mut tx = conn.begin().await?;
    store::scopes::update_flags(&mut tx, scope_id, scope.visibility, scope.is_active).await?;
    store::audit::insert(&mut tx, &event, Some(actor_id)).await?;
    tx.commit().await?;

    info!(scope_id = %scope_id, visibility = %scope.visibility, is_active = scope.is_active, actor = %actor, "Scope updated");
    Ok((scope, event))
}

/// Invite a user; the membership grants nothing until accepted
pub async fn invite_member(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    user_id: Uuid,
    role: ScopeRole,
) -> Result<(Membership, AuditEvent)> {
    let repo = ScopedRepository::new(actor);
    repo.authorize(&mut *conn, scope_id, Action::ManageMembers).await?;
    let actor_id = acting_user(actor)?;

    if store::users::load(&mut *conn, user_id).await?.is_none() {
        return Err(CurationError::NotFound(format!("user {}", user_id)));
    }
    if store::memberships::active_for(&mut *conn, scope_id, user_id)
        .await?
        .is_some()
    {
        return Err(CurationError::InvalidInput(
            "user already has an active membership or pending invitation".to_string(),
        ));
    }

    let membership = Membership {
        id: gcur_common::uuid_utils::generate(),
        scope_id,
        user_id,
        role,
        invited_by: Some(actor_id),
        invited_at: gcur_common::time::now(),
        accepted_at: None,
        is_active: true,
        deactivated_at: None,
    };
    let event = AuditEvent::MembershipInvited {
        scope_id,
        user_id,
        role,
        actor_id,
        timestamp: membership.invited_at,
    };

    let mut tx = conn.begin().await?;
    store::memberships::insert(&mut tx, &membership).await?;
    store::audit::insert(&mut tx, &event, Some(actor_id)).await?;
    tx.commit().await?;

    info!(scope_id = %scope_id, user_id = %user_id, role = %role, actor = %actor, "Member invited");
    Ok((membership, event))
}

/// Accept the actor's own pending invitation
pub async fn accept_invitation(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
) -> Result<(Membership, AuditEvent)> {
    let user_id = acting_user(actor)?;
    let mut membership = store::memberships::active_for(&mut *conn, scope_id, user_id)
        .await?
        .ok_or(CurationError::Unauthorized(DenyReason::NotVisible))?;
    if !membership.is_pending() {
        return Err(CurationError::InvalidInput(
            "invitation was already accepted".to_string(),
        ));
    }

    let now = gcur_common::time::now();
    let event = AuditEvent::MembershipAccepted {
        scope_id,
        user_id,
        timestamp: now,
    };
    let mut tx = conn.begin().await?;
    store::memberships::mark_accepted(&mut tx, membership.id).await?;
    store::audit::insert(&mut tx, &event, Some(user_id)).await?;
    tx.commit().await?;

    membership.accepted_at = Some(now);
    info!(scope_id = %scope_id, user_id = %user_id, role = %membership.role, "Invitation accepted");
    Ok((membership, event))
}

/// Revoke a membership (or withdraw a pending invitation)
///
/// Members may always remove themselves.
pub async fn deactivate_membership(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    user_id: Uuid,
) -> Result<AuditEvent> {
    let actor_id = acting_user(actor)?;
    if actor_id != user_id {
        ScopedRepository::new(actor)
            .authorize(&mut *conn, scope_id, Action::ManageMembers)
            .await?;
    }

    let membership = store::memberships::active_for(&mut *conn, scope_id, user_id)
        .await?
        .ok_or_else(|| CurationError::NotFound(format!("active membership for user {}", user_id)))?;

    let event = AuditEvent::MembershipDeactivated {
        scope_id,
        user_id,
        actor_id,
        timestamp: gcur_common::time::now(),
    };
    let mut tx = conn.begin().await?;
    store::memberships::deactivate(&mut tx, membership.id).await?;
    store::audit::insert(&mut tx, &event, Some(actor_id)).await?;
    tx.commit().await?;

    info!(scope_id = %scope_id, user_id = %user_id, actor = %actor, "Membership deactivated");
    Ok(event)
}
