use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Internship, InternshipId, PracticeError};
use super::repository::{RepositoryError, StoreTransaction};

/// Result of a capacity claim. Both arms carry the counters observed by the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SlotReservation {
    Granted { occupied: u32, total: u32 },
    Denied { occupied: u32, total: u32 },
}

impl SlotReservation {
    pub fn is_granted(&self) -> bool {
        matches!(self, SlotReservation::Granted { .. })
    }
}

/// Read-only capacity view for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub internship_id: InternshipId,
    pub occupied: u32,
    pub total: u32,
    pub remaining: u32,
}

impl From<&Internship> for SlotAvailability {
    fn from(internship: &Internship) -> Self {
        Self {
            internship_id: internship.id.clone(),
            occupied: internship.occupied_slots,
            total: internship.total_slots,
            remaining: internship.remaining_slots(),
        }
    }
}

/// Check-then-increment on a row the caller already holds exclusively.
pub(crate) fn claim_slot(internship: &mut Internship) -> SlotReservation {
    if internship.has_capacity() {
        internship.occupied_slots += 1;
        SlotReservation::Granted {
            occupied: internship.occupied_slots,
            total: internship.total_slots,
        }
    } else {
        SlotReservation::Denied {
            occupied: internship.occupied_slots,
            total: internship.total_slots,
        }
    }
}

/// Grants internship capacity one unit at a time. Slots are never released.
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator;

impl SlotAllocator {
    pub fn new() -> Self {
        Self
    }

    pub fn try_reserve(
        &self,
        tx: &mut dyn StoreTransaction,
        internship_id: &InternshipId,
    ) -> Result<SlotReservation, PracticeError> {
        let reservation = tx.reserve_slot(internship_id).map_err(|err| match err {
            RepositoryError::NotFound => PracticeError::not_found("internship", internship_id),
            other => PracticeError::Store(other),
        })?;

        match reservation {
            SlotReservation::Granted { occupied, total } => {
                debug!(%internship_id, occupied, total, "internship slot reserved");
            }
            SlotReservation::Denied { occupied, total } => {
                debug!(%internship_id, occupied, total, "internship capacity exhausted");
            }
        }

        Ok(reservation)
    }

    pub fn availability(
        &self,
        tx: &mut dyn StoreTransaction,
        internship_id: &InternshipId,
    ) -> Result<SlotAvailability, PracticeError> {
        let internship = tx
            .internship(internship_id)?
            .ok_or_else(|| PracticeError::not_found("internship", internship_id))?;
        Ok(SlotAvailability::from(&internship))
    }
}
