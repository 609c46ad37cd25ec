//! BitLocker capture gate: a `Locked` source volume must never be read
//! from during capture, so the gate runs before any snapshot or block
//! copy starts.

use crate::error::EngineError;
use crate::model::BitLockerStatus;

/// Checks the observed protection status before capture proceeds.
/// Returns the status to record in the image's metadata when capture
/// is allowed; fails fast when the volume is `Locked`.
pub fn gate(volume: &str, status: BitLockerStatus) -> Result<BitLockerStatus, EngineError> {
    match status {
        BitLockerStatus::Locked => Err(EngineError::BitLockerLocked { volume: volume.to_string() }),
        BitLockerStatus::Unlocked | BitLockerStatus::Suspended | BitLockerStatus::NotProtected => Ok(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_volume_fails_fast() {
        let result = gate("C:", BitLockerStatus::Locked);
        assert!(matches!(result, Err(EngineError::BitLockerLocked { .. })));
    }

    #[test]
    fn non_locked_states_pass_through_and_record_status() {
        assert_eq!(gate("C:", BitLockerStatus::Unlocked).unwrap(), BitLockerStatus::Unlocked);
        assert_eq!(gate("C:", BitLockerStatus::Suspended).unwrap(), BitLockerStatus::Suspended);
        assert_eq!(gate("C:", BitLockerStatus::NotProtected).unwrap(), BitLockerStatus::NotProtected);
    }
}
