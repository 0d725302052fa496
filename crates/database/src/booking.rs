//! Provider and booking operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Booking, BookingParticipants, ServiceProvider};

fn map_unique(entity: &'static str, id: &str) -> impl FnOnce(sqlx::Error) -> DatabaseError {
    let id = id.to_string();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists { entity, id };
            }
        }
        DatabaseError::Sqlx(e)
    }
}

/// Create a service provider.
pub async fn create_provider(pool: &SqlitePool, provider: &ServiceProvider) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO service_providers (id, user_id)
        VALUES (?, ?)
        "#,
    )
    .bind(&provider.id)
    .bind(&provider.user_id)
    .execute(pool)
    .await
    .map_err(map_unique("ServiceProvider", &provider.id))?;

    Ok(())
}

/// Get a service provider by ID.
pub async fn get_provider(pool: &SqlitePool, id: &str) -> Result<ServiceProvider> {
    sqlx::query_as::<_, ServiceProvider>(
        r#"
        SELECT id, user_id
        FROM service_providers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "ServiceProvider",
        id: id.to_string(),
    })
}

/// Create a booking.
pub async fn create_booking(pool: &SqlitePool, booking: &Booking) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (id, customer_id, provider_id, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.customer_id)
    .bind(&booking.provider_id)
    .bind(&booking.status)
    .execute(pool)
    .await
    .map_err(map_unique("Booking", &booking.id))?;

    Ok(())
}

/// Get a booking by ID.
pub async fn get_booking(pool: &SqlitePool, id: &str) -> Result<Booking> {
    sqlx::query_as::<_, Booking>(
        r#"
        SELECT id, customer_id, provider_id, status
        FROM bookings
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Booking",
        id: id.to_string(),
    })
}

/// Look up a booking together with the account holder of its provider.
///
/// Returns `Ok(None)` when either the booking or its provider is missing.
pub async fn get_booking_participants(
    pool: &SqlitePool,
    booking_id: &str,
) -> Result<Option<BookingParticipants>> {
    let row = sqlx::query_as::<_, BookingParticipants>(
        r#"
        SELECT b.id AS booking_id,
               b.customer_id AS customer_id,
               p.user_id AS provider_user_id,
               b.status AS status
        FROM bookings b
        JOIN service_providers p ON p.id = b.provider_id
        WHERE b.id = ?
        "#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Update a booking's status.
pub async fn update_booking_status(pool: &SqlitePool, id: &str, status: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Booking",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// List bookings where `user_id` is the customer or the provider's owner.
pub async fn list_bookings_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<BookingParticipants>> {
    let rows = sqlx::query_as::<_, BookingParticipants>(
        r#"
        SELECT b.id AS booking_id,
               b.customer_id AS customer_id,
               p.user_id AS provider_user_id,
               b.status AS status
        FROM bookings b
        JOIN service_providers p ON p.id = b.provider_id
        WHERE b.customer_id = ? OR p.user_id = ?
        ORDER BY b.id
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
