//! Silence-on-underrun and a trivial test backend (spec §4.4: "If no
//! data is available, the callback returns silence (zero-filled buffer)
//! so that the audible stream never stalls in flight.")

use crate::{AudioBackend, BackendError, PullCallback};
use core_proto::SampleFormat;

/// Wraps an upstream [`PullCallback`] so that any bytes it didn't fill
/// are zeroed, centralizing the "never stalls in flight" rule instead of
/// letting every backend reimplement it.
pub fn fill_silence_on_underrun(mut inner: PullCallback) -> PullCallback {
    Box::new(move |buffer: &mut [u8]| -> usize {
        let written = inner(buffer);
        if written < buffer.len() {
            buffer[written..].fill(0);
        }
        buffer.len()
    })
}

/// A backend for unit/integration tests: reports nominal activation and
/// lets the test drive the stored callback manually via [`SilenceBackend::pull`].
pub struct SilenceBackend {
    format: Option<SampleFormat>,
    callback: Option<PullCallback>,
    active: bool,
}

impl SilenceBackend {
    pub fn new() -> Self {
        SilenceBackend {
            format: None,
            callback: None,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Drive the registered callback as if the backend's real-time
    /// thread had requested `buffer.len()` bytes. Returns the number of
    /// samples the upstream callback actually produced; panics if the
    /// backend was never started (a test bug, not a runtime condition).
    pub fn pull(&mut self, buffer: &mut [u8]) -> usize {
        let callback = self.callback.as_mut().expect("backend not started");
        if self.active {
            callback(buffer)
        } else {
            buffer.fill(0);
            buffer.len()
        }
    }
}

impl Default for SilenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for SilenceBackend {
    fn configure(&mut self, format: SampleFormat) -> Result<(), BackendError> {
        format.validate().map_err(|_| BackendError::UnsupportedFormat(format))?;
        self.format = Some(format);
        Ok(())
    }

    fn start(&mut self, callback: PullCallback) -> Result<(), BackendError> {
        self.callback = Some(fill_silence_on_underrun(callback));
        Ok(())
    }

    fn activate(&mut self) -> Result<(), BackendError> {
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn stop(&mut self) {
        self.active = false;
        self.callback = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_backend_yields_silence() {
        let mut backend = SilenceBackend::new();
        backend.configure(SampleFormat::default()).unwrap();
        backend.start(Box::new(|_buf: &mut [u8]| 0)).unwrap();

        let mut buf = [0xAAu8; 16];
        let n = backend.pull(&mut buf);
        assert_eq!(n, 16);
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn partial_write_is_silence_filled() {
        let mut backend = SilenceBackend::new();
        backend.configure(SampleFormat::default()).unwrap();
        backend
            .start(Box::new(|buf: &mut [u8]| {
                buf[0] = 7;
                1
            }))
            .unwrap();
        backend.activate().unwrap();

        let mut buf = [0xAAu8; 4];
        let n = backend.pull(&mut buf);
        assert_eq!(n, 4);
        assert_eq!(buf, [7, 0, 0, 0]);
    }
}
