//! Logging setup, identical in spirit to the speaker's: `tracing`/
//! `tracing-subscriber`, with `--syslog` routing through `libc::syslog`
//! and `--debug` raising the default filter level.

use std::io;
use tracing_subscriber::EnvFilter;

pub fn init(debug: bool, syslog: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug" } else { "info" })
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter).without_time();

    if syslog {
        builder.with_writer(SyslogWriter::make).init();
    } else {
        builder.with_writer(io::stderr).init();
    }
}

struct SyslogWriter {
    line: Vec<u8>,
}

impl SyslogWriter {
    fn make() -> Self {
        SyslogWriter { line: Vec::new() }
    }
}

impl io::Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.line.is_empty() {
            return Ok(());
        }
        emit_syslog(&self.line);
        self.line.clear();
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

#[cfg(unix)]
fn emit_syslog(line: &[u8]) {
    let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
    if let Ok(text) = std::ffi::CString::new(trimmed) {
        unsafe {
            libc::syslog(libc::LOG_INFO, b"%s\0".as_ptr() as *const libc::c_char, text.as_ptr());
        }
    }
}

#[cfg(not(unix))]
fn emit_syslog(_line: &[u8]) {}
