//! Booking lookup backed by the local bookings table.

use async_trait::async_trait;
use chat_core::{BookingLookup, BookingRecord, Result};
use chat_database::{booking, Database};

use crate::config::MessagingConfig;
use crate::error::db_error;

/// [`BookingLookup`] over the `bookings` and `service_providers` tables.
#[derive(Debug, Clone)]
pub struct SqliteBookings {
    db: Database,
    engaged_statuses: Vec<String>,
}

impl SqliteBookings {
    /// Create a lookup using the engaged statuses from `config`.
    pub fn new(db: Database, config: &MessagingConfig) -> Self {
        Self {
            db,
            engaged_statuses: config.engaged_statuses.clone(),
        }
    }
}

#[async_trait]
impl BookingLookup for SqliteBookings {
    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingRecord>> {
        let row = booking::get_booking_participants(self.db.pool(), booking_id)
            .await
            .map_err(db_error)?;

        Ok(row.map(|p| BookingRecord {
            booking_id: p.booking_id,
            customer_id: p.customer_id,
            provider_account_id: p.provider_user_id,
            status: p.status,
        }))
    }

    fn is_engaged(&self, status: &str) -> bool {
        self.engaged_statuses.iter().any(|s| s == status)
    }
}
