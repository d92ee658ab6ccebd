use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

/// Identity lives in the external auth provider; this only guarantees a
/// platform admin row exists so ownership checks have someone to resolve to.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();

    let existing = repositories::users::find_by_email(state.db(), &admin.bootstrap_admin_email)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let now = primitive_now_utc();
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email: &admin.bootstrap_admin_email,
            full_name: &admin.bootstrap_admin_name,
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(email = %admin.bootstrap_admin_email, "Bootstrap admin user created");
    Ok(())
}
