use crate::{db::DbPool, entities::product, errors::ServiceError, events::EventSender};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// Command trait for implementing the Command Pattern
///
/// This trait allows for encapsulating all the logic needed to execute a business operation
/// into a single object that can be validated, executed, and produce events.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `db_pool` - Database connection pool for persistence operations
    /// * `event_sender` - Channel to publish domain events
    ///
    /// # Returns
    /// * `Result<Self::Result, ServiceError>` - The result of command execution or an error
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

pub mod dispatch;
pub mod orders;
pub mod payments;
pub mod purchase_requests;

/// Writes `active` only if the stored row still carries `expected_version`.
///
/// The caller is responsible for setting the new version and `updated_at` on
/// `active`; entity hooks do not run on this path. A miss surfaces as
/// [`ServiceError::ConcurrentModification`].
pub(crate) async fn update_versioned<A, C>(
    conn: &C,
    record_id: Uuid,
    active: A,
    version_column: <A::Entity as EntityTrait>::Column,
    expected_version: i32,
) -> Result<<A::Entity as EntityTrait>::Model, ServiceError>
where
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    <A::Entity as EntityTrait>::update(active)
        .filter(version_column.eq(expected_version))
        .exec(conn)
        .await
        .map_err(|e| match e {
            DbErr::RecordNotUpdated => ServiceError::ConcurrentModification(record_id),
            other => ServiceError::DatabaseError(other),
        })
}

/// Applies counter changes to one product under its version check.
/// Returns `None` when the product does not exist.
pub(crate) async fn update_product_counters<C, F>(
    conn: &C,
    product_id: Uuid,
    apply: F,
) -> Result<Option<product::Model>, ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(&product::Model, &mut product::ActiveModel) + Send,
{
    let Some(current) = product::Entity::find_by_id(product_id).one(conn).await? else {
        return Ok(None);
    };

    let version = current.version;
    let mut active: product::ActiveModel = current.clone().into();
    apply(&current, &mut active);
    active.version = Set(version + 1);
    active.updated_at = Set(Some(Utc::now()));

    update_versioned(conn, product_id, active, product::Column::Version, version)
        .await
        .map(Some)
}

/// Rejects a request that was built against a stale copy of the record.
pub(crate) fn check_expected_version(
    record_id: Uuid,
    current: i32,
    expected: Option<i32>,
) -> Result<(), ServiceError> {
    match expected {
        Some(v) if v != current => Err(ServiceError::ConcurrentModification(record_id)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_version_is_optional() {
        let id = Uuid::new_v4();
        assert!(check_expected_version(id, 3, None).is_ok());
        assert!(check_expected_version(id, 3, Some(3)).is_ok());
        assert!(matches!(
            check_expected_version(id, 3, Some(2)),
            Err(ServiceError::ConcurrentModification(got)) if got == id
        ));
    }
}
