//! External configuration surface (spec §6).

use std::{collections::HashSet, time::Duration};

use crate::MessagingError;

/// Configuration consumed by a [`crate::MessagingFacade`] at construction.
///
/// Defaults mirror spec §6's table exactly. Call [`MessagingConfig::validate`]
/// before use; an invalid configuration is a fatal, construction-time
/// condition, never a runtime one.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// Enables the ASIL-B plane and ASIL-B-only bounds-checking.
    pub asil_b_capable: bool,
    /// Capacity of the non-blocking wrapper's queue.
    pub sender_queue_size: usize,
    /// Minimum in-flight frames the QM receiver must buffer.
    pub receiver_queue_size_qm: usize,
    /// Minimum in-flight frames the ASIL-B receiver must buffer.
    pub receiver_queue_size_asil_b: usize,
    /// Per-plane peer allowlist for QM. Empty means unrestricted.
    pub allowed_user_ids_qm: HashSet<u32>,
    /// Per-plane peer allowlist for ASIL-B. Empty means unrestricted.
    pub allowed_user_ids_asil_b: HashSet<u32>,
    /// Max `try_send` attempts.
    pub send_retry_count: u32,
    /// Sleep between send attempts.
    pub send_retry_delay: Duration,
    /// Sleep between sender-open retries.
    pub connect_retry_delay: Duration,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            asil_b_capable: false,
            sender_queue_size: 16,
            receiver_queue_size_qm: 16,
            receiver_queue_size_asil_b: 16,
            allowed_user_ids_qm: HashSet::new(),
            allowed_user_ids_asil_b: HashSet::new(),
            send_retry_count: 5,
            send_retry_delay: Duration::ZERO,
            connect_retry_delay: Duration::from_millis(5),
        }
    }
}

impl MessagingConfig {
    /// Reject configurations that cannot be honored.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::ConfigError`] if `sender_queue_size` exceeds
    /// the non-blocking wrapper's hard cap.
    pub fn validate(&self) -> Result<(), MessagingError> {
        if self.sender_queue_size > lola_transport::MAX_QUEUE_CAPACITY {
            return Err(MessagingError::ConfigError(format!(
                "sender_queue_size {} exceeds hard cap {}",
                self.sender_queue_size,
                lola_transport::MAX_QUEUE_CAPACITY
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(MessagingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_queue_size_above_hard_cap() {
        let config = MessagingConfig { sender_queue_size: 101, ..MessagingConfig::default() };
        assert!(config.validate().is_err());
    }
}
