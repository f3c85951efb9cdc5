//! Session resolution. Sessions are issued elsewhere; this side only reads them.

use crate::error::AppError;
use crate::model::User;
use crate::store::Tables;
use sqlx::PgPool;
use uuid::Uuid;

pub struct AuthService;

impl AuthService {
    /// User owning an unexpired session `token`, if any.
    pub async fn user_for_session(pool: &PgPool, t: &Tables, token: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT u.id, u.email, u.name, u.role FROM {} s JOIN {} u ON u.id = s.user_id \
             WHERE s.token = $1 AND s.expires_at > NOW()",
            t.sessions, t.users
        );
        tracing::debug!(sql = %sql, "query");
        let row: Option<(Uuid, String, String, String)> = sqlx::query_as(&sql)
            .bind(token)
            .fetch_optional(pool)
            .await?;
        match row {
            None => Ok(None),
            Some((id, email, name, role)) => Ok(Some(User {
                id,
                email,
                name,
                role: role.parse()?,
            })),
        }
    }
}
