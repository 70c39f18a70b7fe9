//! Control channel (spec §4.8, C10): "a process-private stream socket
//! whose path is configured. Each accepted connection reads one line;
//! if the line equals `stop`, the process terminates immediately ...;
//! if it equals `query`, the connection replies `running` and closes;
//! other lines are ignored. No concurrent clients are serviced."
//!
//! Shared by both `speaker` and `player` binaries, constructed with
//! different socket paths from their respective configs.

use core_proto::control::{CMD_QUERY, CMD_STOP, REPLY_RUNNING};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// A bound, not-yet-serving control socket.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    /// Bind a Unix domain socket at `path`, removing any stale socket
    /// file left behind by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        Ok(ControlServer { listener, path })
    }

    /// Run the accept loop on a dedicated thread. `on_stop` is invoked
    /// (and the loop exits) the moment a `stop` command is read; the
    /// caller is responsible for actually terminating the process from
    /// within that closure (spec §7: "the controlling server is assumed
    /// trusted and correct" — no further validation is performed here).
    pub fn spawn(self, on_stop: impl Fn() + Send + 'static) -> JoinHandle<()> {
        thread::Builder::new()
            .name("control-channel".into())
            .spawn(move || {
                for incoming in self.listener.incoming() {
                    let stream = match incoming {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!(error = %e, "control channel accept error");
                            continue;
                        }
                    };
                    match handle_connection(stream) {
                        Some(Command::Stop) => {
                            on_stop();
                            return;
                        }
                        Some(Command::Query) | None => {}
                    }
                }
            })
            .expect("spawn control-channel thread")
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

enum Command {
    Stop,
    Query,
}

fn handle_connection(mut stream: UnixStream) -> Option<Command> {
    let mut line = String::new();
    {
        let mut reader = BufReader::new(&stream);
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
    }

    match line.trim() {
        CMD_STOP => Some(Command::Stop),
        CMD_QUERY => {
            let _ = writeln!(stream, "{REPLY_RUNNING}");
            Some(Command::Query)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("core-control-test-{}-{}.sock", std::process::id(), name))
    }

    #[test]
    fn query_replies_running_without_stopping() {
        let path = socket_path("query");
        let server = ControlServer::bind(&path).unwrap();
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_clone = stopped.clone();
        let _handle = server.spawn(move || stopped_clone.store(true, Ordering::SeqCst));

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"query\n").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        assert_eq!(reply.trim(), REPLY_RUNNING);

        thread::sleep(Duration::from_millis(50));
        assert!(!stopped.load(Ordering::SeqCst));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stop_triggers_callback_and_ends_loop() {
        let path = socket_path("stop");
        let server = ControlServer::bind(&path).unwrap();
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_clone = stopped.clone();
        let handle = server.spawn(move || stopped_clone.store(true, Ordering::SeqCst));

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"stop\n").unwrap();
        drop(client);

        handle.join().unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unknown_line_is_ignored() {
        let path = socket_path("unknown");
        let server = ControlServer::bind(&path).unwrap();
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_clone = stopped.clone();
        let _handle = server.spawn(move || stopped_clone.store(true, Ordering::SeqCst));

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"banana\n").unwrap();
        drop(client);

        thread::sleep(Duration::from_millis(50));
        assert!(!stopped.load(Ordering::SeqCst));
        let _ = std::fs::remove_file(&path);
    }
}
