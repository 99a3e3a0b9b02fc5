//! # Event Bus
//!
//! Broadcast channel for login lifecycle events.
//!
//! The login orchestrator publishes an [`AuthEvent`] at each milestone:
//! account creation, sign-in, token issuance and failure. Subscribers (audit
//! logging, metrics, tests) observe them without the orchestrator knowing who
//! listens. Publishing never blocks and never fails a login; an event sent
//! with no subscribers is simply dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::SendError, Receiver};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted by the login flow.
///
/// Events carry identifiers only. Raw provider tokens and session keys never
/// appear in an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A new local account was provisioned for an external identity.
    AccountCreated {
        user_id: i64,
        username: String,
        provider: String,
    },
    /// An external identity was verified and resolved to a local user.
    SignedIn {
        user_id: i64,
        provider: String,
        /// `true` when the identity record was created by this login.
        first_login: bool,
    },
    /// A session token was handed out.
    TokenIssued {
        user_id: i64,
        /// `true` when the token did not exist before this request.
        created: bool,
    },
    /// A login attempt ended in failure.
    LoginFailed {
        /// Provider name, absent for the bare token endpoint.
        provider: Option<String>,
        /// Stable failure code, e.g. `AUDIENCE_MISMATCH`.
        code: String,
        message: String,
    },
}

impl AuthEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            AuthEvent::AccountCreated { .. } => "Local account created",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::TokenIssued { .. } => "Session token issued",
            AuthEvent::LoginFailed { .. } => "Login failed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            AuthEvent::LoginFailed { .. } => EventSeverity::Warning,
            AuthEvent::AccountCreated { .. } | AuthEvent::SignedIn { .. } => EventSeverity::Info,
            AuthEvent::TokenIssued { .. } => EventSeverity::Debug,
        }
    }
}

/// Central event bus for publishing and subscribing to events.
///
/// Wraps `tokio::sync::broadcast`: clone the bus to share the sender, call
/// [`subscribe`](EventBus::subscribe) for an independent receiver. Slow
/// subscribers receive `RecvError::Lagged` once they fall behind by more than
/// the buffer capacity.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{AuthEvent, EventBus};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(16);
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus
///     .emit(AuthEvent::TokenIssued { user_id: 7, created: true })
///     .ok();
///
/// let event = subscriber.recv().await.unwrap();
/// assert_eq!(event, AuthEvent::TokenIssued { user_id: 7, created: true });
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: AuthEvent) -> Result<usize, SendError<AuthEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn failed(code: &str) -> AuthEvent {
        AuthEvent::LoginFailed {
            provider: Some("google".to_string()),
            code: code.to_string(),
            message: "token not meant for this app".to_string(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(4);
        assert!(bus.emit(failed("AUDIENCE_MISMATCH")).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus
            .emit(AuthEvent::SignedIn {
                user_id: 1,
                provider: "facebook".to_string(),
                first_login: false,
            })
            .unwrap();
        assert_eq!(delivered, 2);

        assert!(matches!(first.recv().await.unwrap(), AuthEvent::SignedIn { user_id: 1, .. }));
        assert!(matches!(second.recv().await.unwrap(), AuthEvent::SignedIn { user_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_lagging_subscriber() {
        let bus = EventBus::new(2);
        let mut subscriber = bus.subscribe();

        for code in ["A", "B", "C"] {
            bus.emit(failed(code)).unwrap();
        }

        assert!(matches!(subscriber.recv().await, Err(RecvError::Lagged(1))));
        assert_eq!(subscriber.recv().await.unwrap(), failed("B"));
    }

    #[test]
    fn test_severity_and_description() {
        assert_eq!(failed("X").severity(), EventSeverity::Warning);
        assert_eq!(
            AuthEvent::TokenIssued { user_id: 1, created: false }.severity(),
            EventSeverity::Debug
        );
        assert_eq!(
            AuthEvent::AccountCreated {
                user_id: 1,
                username: "u".to_string(),
                provider: "google".to_string()
            }
            .description(),
            "Local account created"
        );
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(AuthEvent::TokenIssued {
            user_id: 3,
            created: true,
        })
        .unwrap();
        assert_eq!(json["event"], "TokenIssued");
        assert_eq!(json["user_id"], 3);
    }

    #[test]
    fn test_debug_shows_subscriber_count() {
        let bus = EventBus::default();
        let _rx = bus.subscribe();
        assert_eq!(format!("{:?}", bus), "EventBus { subscriber_count: 1 }");
    }
}
