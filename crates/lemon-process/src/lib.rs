//! Non-blocking supervision of many child-process I/O streams (§4.A).
//!
//! Built directly on `tokio::process` rather than a hand-rolled epoll loop:
//! one background task per readable stream feeds complete lines into a
//! shared channel, one background task per child awaits its exit status,
//! and [`Supervisor::poll`] drains that channel for up to a bounded time,
//! which is the async-native equivalent of the spec's callback-driven
//! `poll(timeout_ms)`.

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use lemon_core::ChildId;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;

/// Which output stream an I/O event or read concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("child is closed or unknown")]
    Closed,
    #[error("write would block")]
    WouldBlock,
    #[error("broken pipe")]
    BrokenPipe,
    #[error("failed to spawn: {0}")]
    SpawnFailed(String),
}

/// A lifecycle or I/O-readiness event surfaced by [`Supervisor::poll`].
#[derive(Debug, Clone)]
pub enum Event {
    /// A complete line is available via [`Supervisor::read_line`].
    ReadReady { child: ChildId, which: Stream },
    /// The peer closed `which`.
    Hangup { child: ChildId, which: Stream },
    /// The child process exited.
    Exited { child: ChildId, code: Option<i32> },
    /// The child's resources have been fully released.
    Reaped { child: ChildId },
}

/// Internal, single-sender-per-source event carried over the shared channel.
enum RawEvent {
    Line { child: ChildId, which: Stream, line: String },
    Hangup { child: ChildId, which: Stream },
    Exited { child: ChildId, code: Option<i32> },
    Reaped { child: ChildId },
}

struct ChildEntry {
    pid: Option<i32>,
    stdin: Option<ChildStdin>,
    stdout_lines: VecDeque<String>,
    stderr_lines: VecDeque<String>,
    alive: bool,
    /// Set once `Reaped` has arrived but buffered lines are still
    /// unread; the entry lingers until `read_line` drains them, so a
    /// block's last line is never destroyed by its own reap.
    pending_reap: bool,
}

/// Owns every child's pipes and drives their lifecycle events.
///
/// Mirrors the csa-process crate's split between "start a tool" and
/// "consume its output," generalized from a single request/response
/// execution to many concurrently live children.
pub struct Supervisor {
    children: HashMap<ChildId, ChildEntry>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<RawEvent>,
    events_rx: mpsc::UnboundedReceiver<RawEvent>,
    /// When true, `write_line` never appends a trailing newline.
    no_newline: bool,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Supervisor {
            children: HashMap::new(),
            next_id: 0,
            events_tx,
            events_rx,
            no_newline: false,
        }
    }

    /// Build a supervisor whose `write_line` passes text through verbatim
    /// instead of ensuring a trailing newline.
    pub fn with_no_newline(no_newline: bool) -> Self {
        let mut s = Self::new();
        s.no_newline = no_newline;
        s
    }

    /// Start a child with the requested stdio streams piped. Argv fully
    /// determines the command line; there is no shell interpretation.
    pub fn spawn(
        &mut self,
        argv: &[String],
        stdin_enabled: bool,
        stdout_enabled: bool,
        stderr_enabled: bool,
    ) -> Result<ChildId, ProcessError> {
        let Some((program, rest)) = argv.split_first() else {
            return Err(ProcessError::SpawnFailed("empty argv".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(rest);
        cmd.stdin(if stdin_enabled { Stdio::piped() } else { Stdio::null() });
        cmd.stdout(if stdout_enabled { Stdio::piped() } else { Stdio::null() });
        cmd.stderr(if stderr_enabled { Stdio::piped() } else { Stdio::null() });
        cmd.kill_on_drop(true);

        // Isolate each child in its own process group so `terminate` can
        // signal the whole group, not just the direct child.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(e.to_string()))?;

        let id = ChildId(self.next_id);
        self.next_id += 1;

        let pid = child.id().map(|p| p as i32);
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = stdout.map(|stdout| {
            tokio::spawn(read_lines_task(
                BufReader::new(stdout),
                Stream::Stdout,
                id,
                self.events_tx.clone(),
            ))
        });
        let stderr_task = stderr.map(|stderr| {
            tokio::spawn(read_lines_task(
                BufReader::new(stderr),
                Stream::Stderr,
                id,
                self.events_tx.clone(),
            ))
        });

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let code = child.wait().await.ok().and_then(|status| status.code());
            let _ = tx.send(RawEvent::Exited { child: id, code });

            // Wait for both reader tasks to finish so every line they read
            // is enqueued strictly before `Reaped` — never after it, which
            // would otherwise race `apply` into dropping the last line.
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
            let _ = tx.send(RawEvent::Reaped { child: id });
        });

        self.children.insert(
            id,
            ChildEntry {
                pid,
                stdin,
                stdout_lines: VecDeque::new(),
                stderr_lines: VecDeque::new(),
                alive: true,
                pending_reap: false,
            },
        );
        Ok(id)
    }

    /// Write a line to the child's stdin without awaiting backpressure: a
    /// single non-blocking attempt, reported as `would_block` if the pipe
    /// isn't immediately writable.
    pub async fn write_line(&mut self, child: ChildId, text: &str) -> Result<usize, ProcessError> {
        let entry = self.children.get_mut(&child).ok_or(ProcessError::Closed)?;
        let stdin = entry.stdin.as_mut().ok_or(ProcessError::Closed)?;

        let mut payload = text.to_string();
        if !self.no_newline && !payload.ends_with('\n') {
            payload.push('\n');
        }
        let bytes = payload.into_bytes();

        tokio::select! {
            biased;
            res = stdin.write(&bytes) => {
                match res {
                    Ok(n) => Ok(n),
                    Err(e) if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) => {
                        Err(ProcessError::BrokenPipe)
                    }
                    Err(_) => Err(ProcessError::BrokenPipe),
                }
            }
            _ = std::future::ready(()) => Err(ProcessError::WouldBlock),
        }
    }

    /// Pop the next complete line for `which`, or `None` if nothing is
    /// buffered yet. Never awaits.
    pub fn read_line(&mut self, child: ChildId, which: Stream) -> Result<Option<String>, ProcessError> {
        let entry = self.children.get_mut(&child).ok_or(ProcessError::Closed)?;
        let queue = match which {
            Stream::Stdout => &mut entry.stdout_lines,
            Stream::Stderr => &mut entry.stderr_lines,
        };
        Ok(queue.pop_front())
    }

    /// Send a polite termination signal (SIGTERM to the child's process
    /// group). The child is reaped asynchronously; see [`Event::Reaped`].
    pub fn terminate(&mut self, child: ChildId) -> Result<(), ProcessError> {
        let entry = self.children.get(&child).ok_or(ProcessError::Closed)?;
        if let Some(pid) = entry.pid {
            #[cfg(unix)]
            unsafe {
                libc::kill(-pid, libc::SIGTERM);
            }
            #[cfg(not(unix))]
            let _ = pid;
        }
        Ok(())
    }

    /// Forcibly kill a child's process group. Used as a shutdown fallback
    /// when `terminate` hasn't produced a reap within a grace period.
    pub fn force_kill(&mut self, child: ChildId) -> Result<(), ProcessError> {
        let entry = self.children.get(&child).ok_or(ProcessError::Closed)?;
        if let Some(pid) = entry.pid {
            #[cfg(unix)]
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
            #[cfg(not(unix))]
            let _ = pid;
        }
        Ok(())
    }

    /// Close the parent-side stdin, signalling EOF to the child. The child
    /// is not killed; it is expected to exit on its own once it notices.
    pub fn close(&mut self, child: ChildId) -> Result<(), ProcessError> {
        let entry = self.children.get_mut(&child).ok_or(ProcessError::Closed)?;
        entry.stdin = None;
        Ok(())
    }

    pub fn is_alive(&self, child: ChildId) -> bool {
        self.children.get(&child).map(|e| e.alive).unwrap_or(false)
    }

    /// Wait up to `timeout` for any child I/O or lifecycle event, then
    /// drain everything already queued. `None` waits indefinitely; `Some(Duration::ZERO)`
    /// never awaits beyond what's already buffered.
    pub async fn poll(&mut self, timeout: Option<Duration>) -> Vec<Event> {
        let mut events = Vec::new();

        let sleep = async {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(sleep);

        tokio::select! {
            biased;
            Some(raw) = self.events_rx.recv() => {
                self.apply(raw, &mut events);
            }
            _ = &mut sleep => {}
        }

        while let Ok(raw) = self.events_rx.try_recv() {
            self.apply(raw, &mut events);
        }

        // A child reaped earlier this call (or a previous one) may have had
        // its last line sitting unread; only finalize it once the queues
        // the caller drains via `read_line` are actually empty.
        self.drain_pending_reaps(&mut events);
        events
    }

    fn apply(&mut self, raw: RawEvent, events: &mut Vec<Event>) {
        match raw {
            RawEvent::Line { child, which, line } => {
                if let Some(entry) = self.children.get_mut(&child) {
                    match which {
                        Stream::Stdout => entry.stdout_lines.push_back(line),
                        Stream::Stderr => entry.stderr_lines.push_back(line),
                    }
                    events.push(Event::ReadReady { child, which });
                }
            }
            RawEvent::Hangup { child, which } => {
                events.push(Event::Hangup { child, which });
            }
            RawEvent::Exited { child, code } => {
                if let Some(entry) = self.children.get_mut(&child) {
                    entry.alive = false;
                }
                events.push(Event::Exited { child, code });
            }
            RawEvent::Reaped { child } => {
                match self.children.get_mut(&child) {
                    Some(entry) if entry.stdout_lines.is_empty() && entry.stderr_lines.is_empty() => {
                        self.children.remove(&child);
                        events.push(Event::Reaped { child });
                    }
                    Some(entry) => entry.pending_reap = true,
                    None => {}
                }
            }
        }
    }

    fn drain_pending_reaps(&mut self, events: &mut Vec<Event>) {
        let ready: Vec<ChildId> = self
            .children
            .iter()
            .filter(|(_, e)| e.pending_reap && e.stdout_lines.is_empty() && e.stderr_lines.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for child in ready {
            self.children.remove(&child);
            events.push(Event::Reaped { child });
        }
    }
}

async fn read_lines_task<R>(
    mut reader: BufReader<R>,
    which: Stream,
    child: ChildId,
    tx: mpsc::UnboundedSender<RawEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = String::new();
    loop {
        buf.clear();
        match reader.read_line(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(RawEvent::Hangup { child, which });
                break;
            }
            Ok(_) => {
                let trimmed = buf.strip_suffix('\n').unwrap_or(&buf);
                let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
                let line = trimmed.to_string();
                let _ = tx.send(RawEvent::Line { child, which, line });
            }
            Err(_) => {
                let _ = tx.send(RawEvent::Hangup { child, which });
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn spawn_and_read_one_line() {
        let mut sup = Supervisor::new();
        let id = sup
            .spawn(&argv(&["printf", "hello\\n"]), false, true, false)
            .unwrap();

        let mut got = None;
        for _ in 0..50 {
            let events = sup.poll(Some(Duration::from_millis(50))).await;
            for ev in events {
                if let Event::ReadReady { which: Stream::Stdout, .. } = ev {
                    got = sup.read_line(id, Stream::Stdout).unwrap();
                }
            }
            if got.is_some() {
                break;
            }
        }
        assert_eq!(got.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn short_lived_child_output_survives_exit_and_reap() {
        // A block that prints one line and exits immediately: its Line,
        // Exited, and Reaped events routinely land in the same poll() drain.
        // The line must still be readable.
        let mut sup = Supervisor::new();
        let id = sup
            .spawn(&argv(&["printf", "only-line\\n"]), false, true, false)
            .unwrap();

        let mut got = None;
        let mut reaped = false;
        for _ in 0..50 {
            let events = sup.poll(Some(Duration::from_millis(50))).await;
            for ev in &events {
                match ev {
                    Event::ReadReady { which: Stream::Stdout, .. } => {
                        got = sup.read_line(id, Stream::Stdout).unwrap();
                    }
                    Event::Reaped { .. } => reaped = true,
                    _ => {}
                }
            }
            if reaped {
                break;
            }
        }
        assert_eq!(got.as_deref(), Some("only-line"));
        assert!(reaped);
    }

    #[tokio::test]
    async fn exited_then_reaped_events_are_delivered() {
        let mut sup = Supervisor::new();
        let id = sup.spawn(&argv(&["true"]), false, false, false).unwrap();

        let mut saw_exit = false;
        let mut saw_reap = false;
        for _ in 0..50 {
            let events = sup.poll(Some(Duration::from_millis(50))).await;
            for ev in events {
                match ev {
                    Event::Exited { child, .. } if child == id => saw_exit = true,
                    Event::Reaped { child } if child == id => saw_reap = true,
                    _ => {}
                }
            }
            if saw_exit && saw_reap {
                break;
            }
        }
        assert!(saw_exit && saw_reap);
        assert!(!sup.is_alive(id));
    }

    #[tokio::test]
    async fn write_line_to_dead_stdin_reports_closed() {
        let mut sup = Supervisor::new();
        let id = sup.spawn(&argv(&["true"]), false, false, false).unwrap();
        let err = sup.write_line(id, "hi").await.unwrap_err();
        assert!(matches!(err, ProcessError::Closed));
    }

    #[tokio::test]
    async fn read_line_on_unknown_child_is_closed() {
        let mut sup = Supervisor::new();
        let err = sup.read_line(ChildId(9999), Stream::Stdout).unwrap_err();
        assert!(matches!(err, ProcessError::Closed));
    }
}
