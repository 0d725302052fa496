//! Message log operations.
//!
//! Rows within a booking are ordered by `created_at`, ties broken by `id`.
//! Participant checks live above this layer; these functions only enforce
//! what can be expressed in a single statement (sender-only deletes).

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{MessageRow, NewMessage, UnreadByBooking};
use crate::validation;

const MESSAGE_COLUMNS: &str =
    "id, booking_id, sender_id, receiver_id, kind, body, mime_hint, is_read, created_at";

/// Insert a message and return the stored row.
///
/// The body is validated for its kind and stored trimmed. `created_at` is
/// raised to the newest timestamp already in the booking, so timestamp order
/// and id order agree.
pub async fn insert_message(pool: &SqlitePool, message: &NewMessage) -> Result<MessageRow> {
    let body = validation::validate_body(&message.kind, &message.body)?;

    let sql = format!(
        r#"
        INSERT INTO messages (booking_id, sender_id, receiver_id, kind, body, mime_hint, created_at)
        VALUES (?, ?, ?, ?, ?, ?, MAX(?, COALESCE(
            (SELECT MAX(created_at) FROM messages WHERE booking_id = ?), 0
        )))
        RETURNING {MESSAGE_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(&message.booking_id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.kind)
        .bind(body)
        .bind(&message.mime_hint)
        .bind(message.created_at)
        .bind(&message.booking_id)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<MessageRow> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");

    sqlx::query_as::<_, MessageRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Message",
            id: id.to_string(),
        })
}

/// Full history of a booking, oldest first.
pub async fn list_messages(pool: &SqlitePool, booking_id: &str) -> Result<Vec<MessageRow>> {
    let sql = format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE booking_id = ?
        ORDER BY created_at ASC, id ASC
        "#
    );

    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(booking_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Messages of a booking with an id greater than `after_id`, in id order.
pub async fn list_messages_after(
    pool: &SqlitePool,
    booking_id: &str,
    after_id: i64,
    limit: i64,
) -> Result<Vec<MessageRow>> {
    let sql = format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE booking_id = ? AND id > ?
        ORDER BY id ASC
        LIMIT ?
        "#
    );

    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(booking_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Mark every unread message addressed to `receiver_id` in a booking as read.
///
/// Returns only the rows whose flag flipped, oldest first. Calling it again
/// returns an empty list.
pub async fn mark_read(
    pool: &SqlitePool,
    booking_id: &str,
    receiver_id: &str,
) -> Result<Vec<MessageRow>> {
    let sql = format!(
        r#"
        UPDATE messages
        SET is_read = 1
        WHERE booking_id = ? AND receiver_id = ? AND is_read = 0
        RETURNING {MESSAGE_COLUMNS}
        "#
    );

    let mut rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(booking_id)
        .bind(receiver_id)
        .fetch_all(pool)
        .await?;

    rows.sort_by_key(|row| (row.created_at, row.id));
    Ok(rows)
}

/// Delete a message if `sender_id` wrote it.
///
/// Returns `false` when no such message exists for that sender.
pub async fn delete_message_by_sender(
    pool: &SqlitePool,
    id: i64,
    sender_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE id = ? AND sender_id = ?
        "#,
    )
    .bind(id)
    .bind(sender_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every message of a booking that `user_id` sent or received.
///
/// Returns the number of rows removed.
pub async fn delete_conversation_for(
    pool: &SqlitePool,
    booking_id: &str,
    user_id: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE booking_id = ? AND (sender_id = ? OR receiver_id = ?)
        "#,
    )
    .bind(booking_id)
    .bind(user_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Unread messages addressed to `receiver_id` across all bookings.
pub async fn count_unread(pool: &SqlitePool, receiver_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM messages
        WHERE receiver_id = ? AND is_read = 0
        "#,
    )
    .bind(receiver_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Unread messages addressed to `receiver_id` in one booking.
pub async fn count_unread_in_booking(
    pool: &SqlitePool,
    booking_id: &str,
    receiver_id: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM messages
        WHERE booking_id = ? AND receiver_id = ? AND is_read = 0
        "#,
    )
    .bind(booking_id)
    .bind(receiver_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Unread messages addressed to `receiver_id`, grouped by booking.
///
/// Bookings with nothing unread are omitted.
pub async fn count_unread_by_booking(
    pool: &SqlitePool,
    receiver_id: &str,
) -> Result<Vec<UnreadByBooking>> {
    let rows = sqlx::query_as::<_, UnreadByBooking>(
        r#"
        SELECT booking_id, COUNT(*) AS unread
        FROM messages
        WHERE receiver_id = ? AND is_read = 0
        GROUP BY booking_id
        ORDER BY booking_id
        "#,
    )
    .bind(receiver_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The latest message of every booking `user_id` has exchanged messages in,
/// most recent first.
pub async fn list_latest_messages_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<MessageRow>> {
    let sql = format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages m
        WHERE (m.sender_id = ? OR m.receiver_id = ?)
          AND m.id = (
              SELECT m2.id
              FROM messages m2
              WHERE m2.booking_id = m.booking_id
              ORDER BY m2.created_at DESC, m2.id DESC
              LIMIT 1
          )
        ORDER BY m.created_at DESC, m.id DESC
        "#
    );

    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
