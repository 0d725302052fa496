//! Channel directory: who may talk about a booking.

use std::sync::Arc;

use chat_core::{BookingLookup, ChatError, ResolvedConversation, Result};
use tracing::{debug, warn};

/// Resolves bookings to their two participants and denies everyone else.
///
/// Pure reads; every privileged operation calls back into the directory
/// rather than trusting an earlier resolution.
#[derive(Clone)]
pub struct ChannelDirectory {
    bookings: Arc<dyn BookingLookup>,
}

impl ChannelDirectory {
    /// Create a directory over a booking lookup.
    pub fn new(bookings: Arc<dyn BookingLookup>) -> Self {
        Self { bookings }
    }

    /// Look up a conversation without checking who is asking.
    ///
    /// `other_participant` is set to the provider account holder. Callers
    /// must perform their own participant check.
    pub async fn lookup(&self, booking_id: &str) -> Result<ResolvedConversation> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Booking", booking_id))?;

        if booking.customer_id == booking.provider_account_id {
            warn!(booking_id = %booking_id, "Booking has a single participant");
            return Err(ChatError::Validation(format!(
                "booking {} has the same customer and provider account",
                booking_id
            )));
        }

        let engaged = self.bookings.is_engaged(&booking.status);

        Ok(ResolvedConversation {
            conversation_id: booking.booking_id,
            participant_a: booking.customer_id,
            other_participant: booking.provider_account_id.clone(),
            participant_b: booking.provider_account_id,
            status: booking.status,
            engaged,
        })
    }

    /// Resolve a booking's conversation for `user_id`.
    ///
    /// Fails with `NotFound` if the booking does not exist and
    /// `AccessDenied` if `user_id` is neither its customer nor its provider's
    /// account holder.
    pub async fn resolve(&self, booking_id: &str, user_id: &str) -> Result<ResolvedConversation> {
        let mut conversation = self.lookup(booking_id).await?;

        let other = match conversation.counterpart_of(user_id) {
            Some(other) => other.to_string(),
            None => {
                debug!(booking_id = %booking_id, user_id = %user_id, "Access denied");
                return Err(ChatError::AccessDenied(format!(
                    "user {} is not a participant of booking {}",
                    user_id, booking_id
                )));
            }
        };

        conversation.other_participant = other;
        Ok(conversation)
    }
}
