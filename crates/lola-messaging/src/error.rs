//! Errors surfaced by the messaging facade and its components.

/// Errors returned to callers of the notification handler / facade.
///
/// Per the propagation policy (spec §7), most operations return nothing
/// useful to act on and simply log; only [`crate::NotificationHandler::register_event_notification`]
/// has a condition worth surfacing as a typed error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessagingError {
    /// The provider-side subscription machinery (out of scope for this
    /// crate) rejected the registration because it already has the maximum
    /// number of subscribers for this element.
    #[error("subscriber limit exceeded for element")]
    SubscriberLimitExceeded,

    /// The supplied [`crate::MessagingConfig`] failed validation.
    #[error("invalid messaging configuration: {0}")]
    ConfigError(String),
}
