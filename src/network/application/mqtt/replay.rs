//! Timestamp based replay protection.

use super::error::CommError;

/// Replay guard configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Accept the very first reading whatever its timestamp, including 0.
    ///
    /// When `false` the guard starts from an accepted timestamp of 0, so a
    /// first reading stamped 0 is indistinguishable from a replay and is
    /// rejected.
    pub accept_zero_timestamp: bool,
}

/// Admits a reading only if its timestamp is strictly newer than the last
/// admitted one. State lives for the lifetime of the guard and is never reset.
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    config: ReplayConfig,
    last_accepted: Option<u32>,
}

impl ReplayGuard {
    /// A guard that has not admitted anything yet.
    pub const fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            last_accepted: None,
        }
    }

    /// Highest timestamp admitted so far, 0 before the first one.
    pub fn last_accepted(&self) -> u32 {
        self.last_accepted.unwrap_or(0)
    }

    /// Checks `timestamp` and records it when fresh.
    ///
    /// # Errors
    ///
    /// [`CommError::ReplayDetected`] when `timestamp` is not strictly greater
    /// than the last admitted one. The guard is left unchanged.
    pub fn admit(&mut self, timestamp: u32) -> Result<(), CommError> {
        let fresh = match self.last_accepted {
            Some(last) => timestamp > last,
            None => self.config.accept_zero_timestamp || timestamp > 0,
        };

        if !fresh {
            return Err(CommError::ReplayDetected);
        }
        self.last_accepted = Some(timestamp);
        Ok(())
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let mut guard = ReplayGuard::default();
        assert_eq!(guard.admit(50), Ok(()));
        assert_eq!(guard.admit(100), Ok(()));
        assert_eq!(guard.last_accepted(), 100);
    }

    #[test]
    fn test_equal_timestamp_is_replay() {
        let mut guard = ReplayGuard::default();
        guard.admit(100).unwrap();
        assert_eq!(guard.admit(100), Err(CommError::ReplayDetected));
        assert_eq!(guard.admit(99), Err(CommError::ReplayDetected));
        assert_eq!(guard.last_accepted(), 100);
    }

    #[test]
    fn test_zero_rejected_by_default() {
        let mut guard = ReplayGuard::default();
        assert_eq!(guard.last_accepted(), 0);
        assert_eq!(guard.admit(0), Err(CommError::ReplayDetected));
        assert_eq!(guard.admit(1), Ok(()));
    }

    #[test]
    fn test_zero_accepted_when_configured() {
        let mut guard = ReplayGuard::new(ReplayConfig {
            accept_zero_timestamp: true,
        });
        assert_eq!(guard.admit(0), Ok(()));
        assert_eq!(guard.admit(0), Err(CommError::ReplayDetected));
        assert_eq!(guard.admit(1), Ok(()));
    }

    #[test]
    fn test_max_timestamp_closes_the_window() {
        let mut guard = ReplayGuard::default();
        guard.admit(u32::MAX).unwrap();
        assert_eq!(guard.admit(u32::MAX), Err(CommError::ReplayDetected));
        assert_eq!(guard.admit(0), Err(CommError::ReplayDetected));
    }
}
