use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub confirmed: bool,
    pub avatar_url: Option<String>,
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, confirmed, avatar_url
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password; starts unconfirmed.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, confirmed, avatar_url
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Mark the user with this email as confirmed. Idempotent; an unknown
    /// email is a no-op.
    pub async fn confirm_email(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET confirmed = TRUE
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Persist a new avatar URL and return the updated row.
    pub async fn update_avatar(db: &PgPool, email: &str, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET avatar_url = $2
            WHERE email = $1
            RETURNING id, username, email, password_hash, confirmed, avatar_url
            "#,
        )
        .bind(email)
        .bind(url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User {
            id: 1,
            username: "bob".into(),
            email: "bob@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            confirmed: false,
            avatar_url: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("bob@example.com"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }
}
