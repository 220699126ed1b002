//! Transport-agnostic sending, receiving, retry, and cancellation
//! primitives for the control plane (spec §4.2-§4.4).
//!
//! This crate defines the *contracts* a concrete transport must satisfy
//! ([`Sender`], [`Receiver`], and their factories) plus the transport-
//! independent machinery built on top of them: bounded retry, a
//! non-blocking queueing wrapper, a small explicit worker pool, and
//! cooperative cancellation. No concrete OS transport lives here - the
//! in-process implementation used for testing lives in `lola-harness`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod non_blocking;
mod receiver;
mod retry;
mod sender;
mod stop_token;
mod worker_pool;

pub use error::TransportError;
pub use non_blocking::{MAX_QUEUE_CAPACITY, NonBlockingSender};
pub use receiver::{MediumCallback, Receiver, ReceiverConfig, ReceiverFactory, ShortCallback};
pub use retry::{RetryConfig, send_medium_with_retry, send_short_with_retry};
pub use sender::{Sender, SenderFactory, SharedSender};
pub use stop_token::{StopSource, StopToken};
pub use worker_pool::WorkerPool;
