use crate::auth::dto::UserRow;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, subject, email, role, name, phone, area, address, created_at";

/// Load-or-create for a provider identity. First-ever sign-in inserts a bare
/// row (subject + email); later sign-ins return the existing row untouched —
/// email is immutable post-creation.
pub async fn ensure_user(db: &PgPool, subject: &str, email: &str) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (subject, email)
        VALUES ($1, $2)
        ON CONFLICT (subject) DO UPDATE SET subject = EXCLUDED.subject
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(subject)
    .bind(email)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Merge the role in, once. Returns the updated row, or `None` when the row
/// was missing or the role had already been chosen.
pub async fn set_role(db: &PgPool, id: Uuid, role: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users
        SET role = $2
        WHERE id = $1 AND role IS NULL
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(role)
    .fetch_optional(db)
    .await
}

/// Merge name/phone/(location) in, last-write-wins. An omitted location
/// leaves the stored one untouched.
pub async fn set_details(
    db: &PgPool,
    id: Uuid,
    name: &str,
    phone: &str,
    area: Option<&str>,
    address: Option<&str>,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users
        SET name = $2, phone = $3,
            area = COALESCE($4, area), address = COALESCE($5, address)
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(phone)
    .bind(area)
    .bind(address)
    .fetch_optional(db)
    .await
}
