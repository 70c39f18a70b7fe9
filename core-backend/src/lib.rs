//! Audio backend abstraction (spec §4.4, C5): "every backend (native
//! sound API, RTP transmitter, subprocess pipe, file) presents the same
//! contract ... pull model via callback."
//!
//! The trait itself is the "table-of-function-pointers becomes a
//! capability set" redesign from spec §9. `core-transmit`'s RTP
//! transmitter and `speaker`'s `CpalBackend` both implement
//! [`AudioBackend`]; only the RTP transmitter additionally implements
//! [`RtpDestinationControl`].

pub mod cpal_backend;
pub mod silence;

use core_proto::SampleFormat;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors a backend can report from any of its lifecycle calls (spec §7:
/// "Backend activation failure").
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend cannot satisfy sample format {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("no output device available")]
    NoDevice,

    #[error("backend activation failed: {0}")]
    ActivationFailed(String),

    #[error("backend is in an error state and activation is suppressed")]
    Suppressed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// `callback(buffer) -> samples_written`, invoked from a backend-owned
/// thread (or inline for synchronous backends). Spec §4.4: "MUST return
/// within a few milliseconds; MUST NOT block on unbounded I/O." The
/// buffer is raw PCM bytes in the process-global [`SampleFormat`].
pub type PullCallback = Box<dyn FnMut(&mut [u8]) -> usize + Send>;

/// The uniform backend contract every output path implements (spec
/// §4.4's five operations).
pub trait AudioBackend: Send {
    /// Translate system configuration into backend options; validates
    /// the requested format up front (spec §4.4: "a backend MAY fail
    /// activation if it cannot satisfy the format" — backends that can
    /// detect this at configure time should fail here instead).
    fn configure(&mut self, format: SampleFormat) -> Result<(), BackendError>;

    /// Register the pull callback, allocate resources, and create any
    /// helper threads. After this call the callback must not yet be
    /// invoked — that only starts at [`AudioBackend::activate`].
    fn start(&mut self, callback: PullCallback) -> Result<(), BackendError>;

    /// Enable audio flow. After this returns, the callback may be
    /// invoked at any moment.
    fn activate(&mut self) -> Result<(), BackendError>;

    /// Disable audio flow. After this returns, the callback will not be
    /// invoked until the next activation.
    fn deactivate(&mut self);

    /// Final teardown.
    fn stop(&mut self);
}

/// Narrower capability only the RTP transmitter backend implements
/// (spec §4.5 "request" destination mode; §9 Design Notes: "The RTP
/// backend additionally exposes add_recipient/remove_recipient").
pub trait RtpDestinationControl {
    fn add_recipient(&self, addr: SocketAddr);
    fn remove_recipient(&self, addr: SocketAddr);
}
