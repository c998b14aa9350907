use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::PageParams},
    models::messaging::{Conversation, Message},
};

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, sender_id: Uuid, recipient_id: Uuid, content: &str) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, recipient_id, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    /// Última mensagem e não lidas por interlocutor, mais recentes primeiro.
    pub async fn conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            WITH mine AS (
                SELECT m.*,
                       CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END AS counterpart_id
                FROM messages m
                WHERE m.sender_id = $1 OR m.recipient_id = $1
            ),
            latest AS (
                SELECT DISTINCT ON (counterpart_id) counterpart_id, content, created_at, sender_id
                FROM mine
                ORDER BY counterpart_id, created_at DESC
            ),
            unread AS (
                SELECT sender_id AS counterpart_id, COUNT(*) AS unread_count
                FROM messages
                WHERE recipient_id = $1 AND is_read = FALSE
                GROUP BY sender_id
            )
            SELECT l.counterpart_id,
                   u.name AS counterpart_name,
                   u.role AS counterpart_role,
                   l.content AS last_message,
                   l.created_at AS last_message_at,
                   (l.sender_id = $1) AS last_message_from_me,
                   COALESCE(un.unread_count, 0) AS unread_count
            FROM latest l
            JOIN users u ON u.id = l.counterpart_id
            LEFT JOIN unread un ON un.counterpart_id = l.counterpart_id
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversations)
    }

    pub async fn thread(
        &self,
        user_id: Uuid,
        counterpart_id: Uuid,
        page: &PageParams,
    ) -> Result<(Vec<Message>, i64), AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(counterpart_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(counterpart_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((messages, total))
    }

    /// Marca como lidas as mensagens recebidas de `sender_id`.
    pub async fn mark_thread_read(&self, user_id: Uuid, sender_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE, read_at = NOW()
            WHERE recipient_id = $1 AND sender_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
