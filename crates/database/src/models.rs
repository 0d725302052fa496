//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A service provider listing, owned by one user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ServiceProvider {
    /// Provider id.
    pub id: String,
    /// Account that owns the provider listing.
    pub user_id: String,
}

/// A booking of a provider by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    /// Booking id.
    pub id: String,
    /// Customer account id.
    pub customer_id: String,
    /// Booked provider.
    pub provider_id: String,
    /// Lifecycle status (pending, accepted, in_progress, completed, ...).
    pub status: String,
}

/// A booking joined with the account holder of its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BookingParticipants {
    pub booking_id: String,
    pub customer_id: String,
    pub provider_user_id: String,
    pub status: String,
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MessageRow {
    /// Autoincrement id, strictly increasing in insertion order.
    pub id: i64,
    /// Conversation (booking) id.
    pub booking_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// "text" or "attachment".
    pub kind: String,
    /// Text, or the attachment URL.
    pub body: String,
    pub mime_hint: Option<String>,
    pub is_read: bool,
    /// Unix millis.
    pub created_at: i64,
}

/// A message about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub booking_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub kind: String,
    pub body: String,
    pub mime_hint: Option<String>,
    /// Unix millis.
    pub created_at: i64,
}

/// Unread total for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UnreadByBooking {
    pub booking_id: String,
    pub unread: i64,
}
