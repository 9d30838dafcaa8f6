//! Store-backed authorization
//!
//! Loads the scope and the actor's membership fresh for every decision.

use super::{authorize, Action, Decision, ReadFilter};
use crate::store;
use gcur_common::{Actor, Result};
use sqlx::SqliteConnection;
use tracing::trace;
use uuid::Uuid;

/// `Authorize(actor, scope, action)` against current store contents
pub async fn authorize_in_store(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    action: Action,
) -> Result<Decision> {
    if actor.is_app_admin() {
        return Ok(Decision::Allow);
    }

    let scope = store::scopes::load(&mut *conn, scope_id).await?;
    let membership = match (actor.user_id(), scope.as_ref()) {
        (Some(user_id), Some(_)) => store::memberships::active_for(&mut *conn, scope_id, user_id).await?,
        _ => None,
    };

    let decision = authorize(actor, scope.as_ref(), membership.as_ref(), action);
    trace!(actor = %actor, scope_id = %scope_id, action = ?action, decision = ?decision, "Authorization evaluated");
    Ok(decision)
}

/// `AuthorizeRead(actor)`: the predicate the query layer applies to
/// scope-owned rows
pub async fn read_filter(conn: &mut SqliteConnection, actor: &Actor) -> Result<ReadFilter> {
    if actor.is_app_admin() {
        return Ok(ReadFilter::Unrestricted);
    }
    let member_scopes = match actor.user_id() {
        Some(user_id) => store::memberships::granted_scope_ids(conn, user_id).await?,
        None => Vec::new(),
    };
    Ok(ReadFilter::Restricted { member_scopes })
}
