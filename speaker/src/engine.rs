//! Speaker engine event loop (spec §4.6, §9 "globals→context" and
//! "poll()→channel" redesigns).
//!
//! A single `mpsc::Receiver<EngineEvent>` stands in for the original's
//! `poll()` loop: a stdin-reader thread forwards parsed
//! [`ServerMessage`]s, a listener thread performs the decoder handshake
//! and reports new connections, one reader thread per connected,
//! non-EOF track forwards its chunks, and the playback callback itself
//! signals a drained, end-of-input track through the same channel —
//! the "self-pipe" the original used to wake `poll()` from another
//! thread maps onto this channel directly, no pipe required.

use crate::track::TrackTable;
use core_backend::{AudioBackend, PullCallback};
use core_proto::handshake::{read_track_id, send_ack};
use core_proto::record::{EngineMessage, ServerMessage};
use core_proto::{SampleFormat, TrackId};
use parking_lot::Mutex;
use std::io::{Cursor, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Reader-thread poll backoff while a track's buffer has no free space.
const BUFFER_FULL_BACKOFF: Duration = Duration::from_millis(5);

/// Upper bound on a single socket read, independent of buffer headroom.
const READ_CHUNK_CAP: usize = 4096;

/// How long the event loop waits for its next event before running its
/// periodic housekeeping (status cadence, parent-death check) anyway;
/// also stands in for the original's `poll()` timeout.
const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Status-report cadence while a track is current (spec §4.6: "emitted
/// ... on a cadence no coarser than once per second").
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// `occupancy <= this` at end-of-input is the early-FINISHED threshold
/// (spec §4.6: "1 second of audio").
fn early_finish_bytes(format: SampleFormat) -> usize {
    format.bytes_per_ms() * 1000
}

#[derive(Debug)]
pub enum EngineEvent {
    Server(ServerMessage),
    ServerClosed,
    Connected(TrackId, UnixStream),
    TrackData(TrackId, Vec<u8>),
    TrackEof(TrackId),
    Drained(TrackId),
}

/// The struct every component threads through instead of reaching for
/// process-global state (spec §9: "globals collapse into one context
/// struct passed explicitly").
pub struct EngineContext {
    pub table: Arc<Mutex<TrackTable>>,
    pub format: SampleFormat,
    pub events_tx: Sender<EngineEvent>,
}

impl EngineContext {
    pub fn new(format: SampleFormat, events_tx: Sender<EngineEvent>) -> Self {
        EngineContext {
            table: Arc::new(Mutex::new(TrackTable::new())),
            format,
            events_tx,
        }
    }
}

/// Run the engine until the server closes stdin or a parent-death
/// condition is detected. `events_rx` is the receiving half of the
/// channel whose sender is `ctx.events_tx` — split apart because
/// `main.rs` needs clones of the sender before the channel can be
/// threaded into `EngineContext`.
pub fn run(
    ctx: EngineContext,
    events_rx: Receiver<EngineEvent>,
    listen_path: &Path,
    mut backend: Box<dyn AudioBackend>,
) -> anyhow::Result<()> {
    backend.configure(ctx.format)?;
    backend.start(make_playback_callback(
        ctx.table.clone(),
        ctx.format,
        ctx.events_tx.clone(),
    ))?;

    spawn_stdin_reader(ctx.events_tx.clone());
    spawn_listener(listen_path, ctx.events_tx.clone())?;

    EngineMessage::Ready.write(std::io::stdout().lock())?;
    std::io::stdout().flush().ok();

    let mut active = false;
    let mut last_status = Instant::now();
    let mut last_reported_paused: Option<bool> = None;

    'outer: loop {
        match events_rx.recv_timeout(TICK_INTERVAL) {
            Ok(EngineEvent::Server(msg)) => handle_server_message(&ctx, msg)?,
            Ok(EngineEvent::ServerClosed) => {
                tracing::info!("control stream closed, shutting down");
                break 'outer;
            }
            Ok(EngineEvent::Connected(id, stream)) => handle_connected(&ctx, id, stream)?,
            Ok(EngineEvent::TrackData(id, bytes)) => handle_track_data(&ctx.table, &id, bytes),
            Ok(EngineEvent::TrackEof(id)) => handle_track_eof(&ctx.table, &id),
            Ok(EngineEvent::Drained(id)) => handle_drained(&ctx, &id)?,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break 'outer,
        }

        if parent_is_dead() {
            tracing::info!("parent process gone, shutting down");
            break 'outer;
        }

        sync_backend_activation(&ctx, &mut backend, &mut active);
        report_status(&ctx, &mut last_status, &mut last_reported_paused)?;
    }

    backend.stop();
    Ok(())
}

fn handle_server_message(ctx: &EngineContext, msg: ServerMessage) -> anyhow::Result<()> {
    match msg {
        ServerMessage::Play(id) => handle_play(ctx, id)?,
        ServerMessage::Pause => ctx.table.lock().paused = true,
        ServerMessage::Resume => ctx.table.lock().paused = false,
        ServerMessage::Cancel(id) => handle_cancel(ctx, id)?,
        ServerMessage::Reload => {
            tracing::info!("RELOAD received (configuration re-read is out of scope; acknowledged)");
        }
    }
    Ok(())
}

/// `PLAY`: spec §4.6: "Stage this track as the pending playing track.
/// Fatal if a track is already playing and has not been reported
/// finished, and a pending track is already set." The controlling
/// server is trusted (spec §7), so this violation terminates the
/// process rather than replying with an error record.
fn handle_play(ctx: &EngineContext, id: TrackId) -> anyhow::Result<()> {
    let mut table = ctx.table.lock();

    let current_unfinished = table
        .current
        .as_ref()
        .and_then(|cur| table.get(cur))
        .is_some_and(|t| !t.finished_reported);

    if current_unfinished && table.pending.is_some() {
        anyhow::bail!("PLAY received while current is unfinished and pending is already set");
    }

    table.get_or_create(&id);
    if table.current.is_none() {
        table.current = Some(id);
    } else {
        table.pending = Some(id);
    }
    Ok(())
}

/// `CANCEL`: spec §4.6 table. Order matters: unknown first, then the
/// finished-track prohibition, then STILLBORN vs FINISHED by whether
/// any audio from this track ever reached the backend.
fn handle_cancel(ctx: &EngineContext, id: TrackId) -> anyhow::Result<()> {
    let reply = {
        let mut table = ctx.table.lock();
        if !table.contains(&id) {
            Some(EngineMessage::Unknown(id.clone()))
        } else if table.get(&id).is_some_and(|t| t.finished_reported) {
            tracing::warn!(track = %id, "CANCEL on an already-finished track ignored");
            None
        } else {
            let began = table.get(&id).is_some_and(|t| t.has_begun());
            if let Some(mut track) = table.remove(&id) {
                if let Some(stream) = track.input.take() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
            Some(if began {
                EngineMessage::Finished(id)
            } else {
                EngineMessage::Stillborn(id)
            })
        }
    };

    if let Some(msg) = reply {
        msg.write(std::io::stdout().lock())?;
        std::io::stdout().flush().ok();
    }
    Ok(())
}

fn handle_connected(ctx: &EngineContext, id: TrackId, stream: UnixStream) -> anyhow::Result<()> {
    let already_connected = {
        let table = ctx.table.lock();
        table.get(&id).is_some_and(|t| t.connected)
    };
    if already_connected {
        tracing::warn!(track = %id, "second connection for an already-connected track, dropping it");
        return Ok(());
    }

    let reader_stream = stream.try_clone()?;
    {
        let mut table = ctx.table.lock();
        let track = table.get_or_create(&id);
        track.connected = true;
        track.input = Some(stream);
    }

    send_ack(&reader_stream)?;

    let handle = spawn_track_reader(id.clone(), reader_stream, ctx.table.clone(), ctx.events_tx.clone());
    if let Some(track) = ctx.table.lock().get_mut(&id) {
        track.reader_thread = Some(handle);
    }

    EngineMessage::Arrived(id).write(std::io::stdout().lock())?;
    std::io::stdout().flush().ok();
    Ok(())
}

fn handle_track_data(table: &Arc<Mutex<TrackTable>>, id: &TrackId, bytes: Vec<u8>) {
    let mut table = table.lock();
    if let Some(track) = table.get_mut(id) {
        let mut cursor = Cursor::new(bytes);
        let _ = track.buffer.write_from(&mut cursor);
        if track.buffer.is_full() {
            track.playable = true;
        }
    }
}

fn handle_track_eof(table: &Arc<Mutex<TrackTable>>, id: &TrackId) {
    let mut table = table.lock();
    if let Some(track) = table.get_mut(id) {
        track.eof = true;
        track.playable = true;
    }
}

/// The playback callback's "drained" signal: the current track has
/// reached end-of-input with nothing left buffered. Destroys it and
/// promotes the pending track in one step (spec §4.6 gapless
/// transition), first emitting FINISHED if that has not already
/// happened via the early-FINISHED watermark.
fn handle_drained(ctx: &EngineContext, id: &TrackId) -> anyhow::Result<()> {
    let already_reported = {
        let mut table = ctx.table.lock();
        let reported = table.get(id).is_some_and(|t| t.finished_reported);
        if let Some(track) = table.get_mut(id) {
            track.finished_reported = true;
        }
        if table.current.as_ref() == Some(id) {
            table.promote_pending();
        } else {
            table.remove(id);
        }
        reported
    };

    if !already_reported {
        EngineMessage::Finished(id.clone()).write(std::io::stdout().lock())?;
        std::io::stdout().flush().ok();
    }
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<EngineEvent>) {
    thread::Builder::new()
        .name("speaker-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            loop {
                match ServerMessage::read(stdin.lock()) {
                    Ok(msg) => {
                        if tx.send(EngineEvent::Server(msg)).is_err() {
                            return;
                        }
                    }
                    Err(_) => {
                        let _ = tx.send(EngineEvent::ServerClosed);
                        return;
                    }
                }
            }
        })
        .expect("spawn speaker-stdin thread");
}

fn spawn_listener(path: &Path, tx: Sender<EngineEvent>) -> anyhow::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;

    thread::Builder::new()
        .name("speaker-listener".into())
        .spawn(move || {
            for incoming in listener.incoming() {
                let stream = match incoming {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "decoder accept error");
                        continue;
                    }
                };
                match read_track_id(&stream) {
                    Ok(id) => {
                        if tx.send(EngineEvent::Connected(id, stream)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "decoder handshake failed");
                    }
                }
            }
        })
        .expect("spawn speaker-listener thread");
    Ok(())
}

/// One reader thread per connected track (spec §9's per-fd poll
/// registration, generalized to a dedicated thread per track): caps
/// each read at the buffer's current vacant length so a decoder can
/// never outrun the ring (the same backpressure a single-threaded
/// `poll()` loop gets for free by simply not registering a full
/// track's fd as readable).
fn spawn_track_reader(
    id: TrackId,
    mut stream: UnixStream,
    table: Arc<Mutex<TrackTable>>,
    tx: Sender<EngineEvent>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name(format!("track-reader-{id}"))
        .spawn(move || {
            let mut chunk = vec![0u8; READ_CHUNK_CAP];
            loop {
                let vacant = match table.lock().get(&id) {
                    Some(track) => track.buffer.vacant_len(),
                    None => return,
                };
                if vacant == 0 {
                    thread::sleep(BUFFER_FULL_BACKOFF);
                    continue;
                }
                let want = vacant.min(chunk.len());
                match stream.read(&mut chunk[..want]) {
                    Ok(0) => {
                        let _ = tx.send(EngineEvent::TrackEof(id.clone()));
                        return;
                    }
                    Ok(n) => {
                        if tx.send(EngineEvent::TrackData(id.clone(), chunk[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(BUFFER_FULL_BACKOFF);
                    }
                    Err(e) => {
                        tracing::warn!(track = %id, error = %e, "track reader error");
                        let _ = tx.send(EngineEvent::TrackEof(id.clone()));
                        return;
                    }
                }
            }
        })
        .expect("spawn track reader thread")
}

/// The real-time playback callback (spec §4.4/§4.6): copies one
/// contiguous span from the current track's buffer, releasing the
/// table mutex before returning. Silence-on-underrun is layered on by
/// the backend itself (spec §4.4), so this returns `0` freely whenever
/// there is nothing to copy.
fn make_playback_callback(
    table: Arc<Mutex<TrackTable>>,
    format: SampleFormat,
    drained_tx: Sender<EngineEvent>,
) -> PullCallback {
    let frame_bytes = format.frame_bytes().max(1) as u64;
    Box::new(move |buf: &mut [u8]| -> usize {
        let mut guard = table.lock();
        let Some(id) = guard.current.clone() else {
            return 0;
        };
        let Some(track) = guard.get_mut(&id) else {
            return 0;
        };

        let span = track.buffer.peek_contiguous();
        let n = span.len().min(buf.len());
        buf[..n].copy_from_slice(&span[..n]);
        track.buffer.consume(n);
        track.samples_played += n as u64 / frame_bytes;

        let drained = track.eof && track.buffer.is_empty();
        drop(guard);

        if drained {
            let _ = drained_tx.send(EngineEvent::Drained(id));
        }
        n
    })
}

/// Activate/deactivate the backend to match whether a current, playable,
/// unpaused track exists (spec §4.6: "Playback is enabled only when...").
fn sync_backend_activation(ctx: &EngineContext, backend: &mut Box<dyn AudioBackend>, active: &mut bool) {
    let enabled = ctx.table.lock().playback_enabled();
    if enabled && !*active {
        match backend.activate() {
            Ok(()) => *active = true,
            Err(e) => {
                tracing::warn!(error = %e, "backend activation failed");
                return;
            }
        }
    } else if !enabled && *active {
        backend.deactivate();
        *active = false;
    }

    check_early_finish(ctx);
}

/// Early-FINISHED watermark (spec §4.6): the currently playing track is
/// at end-of-input and has at most one second of audio left buffered.
fn check_early_finish(ctx: &EngineContext) {
    let mut table = ctx.table.lock();
    let Some(id) = table.current.clone() else { return };
    let threshold = early_finish_bytes(ctx.format);
    let Some(track) = table.get_mut(&id) else { return };
    if track.eof && !track.finished_reported && track.buffer.occupancy() <= threshold {
        track.finished_reported = true;
        drop(table);
        let _ = EngineMessage::Finished(id).write(std::io::stdout().lock());
        std::io::stdout().flush().ok();
    }
}

/// Emit PLAYING/PAUSED at a cadence no coarser than once a second, or
/// immediately on a pause/resume transition (spec §4.6).
fn report_status(
    ctx: &EngineContext,
    last_status: &mut Instant,
    last_reported_paused: &mut Option<bool>,
) -> anyhow::Result<()> {
    let table = ctx.table.lock();
    let Some(id) = table.current.clone() else {
        *last_reported_paused = None;
        return Ok(());
    };
    let Some(track) = table.get(&id) else { return Ok(()) };
    let paused = table.paused;
    let elapsed_secs = (track.samples_played / ctx.format.rate as u64) as u32;
    drop(table);

    let transitioned = *last_reported_paused != Some(paused);
    let due = last_status.elapsed() >= STATUS_INTERVAL;
    if !transitioned && !due {
        return Ok(());
    }

    let msg = if paused {
        EngineMessage::Paused { id, elapsed_secs }
    } else {
        EngineMessage::Playing { id, elapsed_secs }
    };
    msg.write(std::io::stdout().lock())?;
    std::io::stdout().flush().ok();

    *last_status = Instant::now();
    *last_reported_paused = Some(paused);
    Ok(())
}

/// Parent-death detection (spec §4.6): "stdin EOF or `getppid() == 1`
/// causes clean exit" — a reparented-to-init process has lost its
/// controlling server.
#[cfg(unix)]
fn parent_is_dead() -> bool {
    unsafe { libc::getppid() == 1 }
}

#[cfg(not(unix))]
fn parent_is_dead() -> bool {
    false
}
