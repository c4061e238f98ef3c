//! Event Loop (§4.B): single-threaded, cooperative multiplexing of the
//! block scheduler, spark engine, output composer, and action dispatcher
//! over the process supervisor.

mod error;
mod exec;
mod renderer;

pub use error::LoopError;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lemon_core::{scheduling, BlockId, ChildId, Mode, SparkId, State};
use lemon_process::{Event, ProcessError, Stream, Supervisor};
use tokio::signal::unix::{signal, SignalKind};

/// What a supervised child belongs to, so an event's `ChildId` can be
/// routed back to the right piece of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Renderer,
    Block(BlockId),
    Spark(SparkId),
}

pub struct EventLoop {
    state: State,
    supervisor: Supervisor,
    owners: HashMap<ChildId, Owner>,
    renderer: ChildId,
    running: bool,
    start: Instant,
    /// Set when `running` was cleared by an unrecoverable condition rather
    /// than a signal, so `run` can report a non-zero exit after shutdown.
    fatal: Option<LoopError>,
}

impl EventLoop {
    /// Spawn the renderer and every spark, yielding a loop ready to `run`.
    pub async fn bootstrap(state: State) -> Result<Self, LoopError> {
        let mut supervisor = Supervisor::new();
        let mut owners = HashMap::new();

        let argv = renderer::build_argv(&state.lemon);
        let renderer_id = supervisor.spawn(&argv, true, true, true)?;
        owners.insert(renderer_id, Owner::Renderer);

        let mut loop_ = EventLoop {
            state,
            supervisor,
            owners,
            renderer: renderer_id,
            running: true,
            start: Instant::now(),
            fatal: None,
        };
        loop_.spawn_initial_sparks();
        Ok(loop_)
    }

    /// Run until a termination signal or a fatal renderer error, then shut
    /// every child down and return.
    pub async fn run(&mut self) -> Result<(), LoopError> {
        let mut sigint = signal(SignalKind::interrupt()).map_err(LoopError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(LoopError::Signal)?;
        let mut sigquit = signal(SignalKind::quit()).map_err(LoopError::Signal)?;
        let mut sigpipe = signal(SignalKind::pipe()).map_err(LoopError::Signal)?;

        while self.running {
            let now = self.now();
            self.open_due_blocks(now);

            if self.state.dirty {
                self.render_and_write().await;
            }

            let wait = self.next_wait();

            tokio::select! {
                biased;
                _ = sigint.recv() => { tracing::info!("received SIGINT"); self.running = false; }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); self.running = false; }
                _ = sigquit.recv() => { tracing::info!("received SIGQUIT"); self.running = false; }
                _ = sigpipe.recv() => { tracing::warn!("received SIGPIPE"); self.running = false; }
                events = self.supervisor.poll(wait) => {
                    self.handle_events(events);
                }
            }
        }

        self.shutdown().await;
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn spawn_initial_sparks(&mut self) {
        let spark_ids: Vec<SparkId> = (0..self.state.sparks.len()).map(SparkId).collect();
        for sid in spark_ids {
            let argv = exec::split_argv(&self.state.spark(sid).command);
            match self.supervisor.spawn(&argv, false, true, true) {
                Ok(child_id) => {
                    self.owners.insert(child_id, Owner::Spark(sid));
                    let spark = self.state.spark_mut(sid);
                    spark.alive = true;
                    spark.child_id = Some(child_id);
                }
                Err(e) => {
                    tracing::warn!(command = %self.state.spark(sid).command, error = %e, "failed to spawn spark");
                }
            }
        }
    }

    fn spark_pending(&self, bid: BlockId) -> bool {
        self.state
            .block(bid)
            .spark
            .map(|sid| self.state.spark(sid).output.is_some())
            .unwrap_or(false)
    }

    fn open_due_blocks(&mut self, now: f64) {
        let block_ids: Vec<BlockId> = (0..self.state.blocks.len()).map(BlockId).collect();
        for bid in block_ids {
            let pending = self.spark_pending(bid);
            if scheduling::is_due(self.state.block(bid), pending, now) {
                self.spawn_block(bid, now);
            }
        }
    }

    fn spawn_block(&mut self, bid: BlockId, now: f64) {
        let block = self.state.block(bid);
        let consume_arg = if block.mode == Mode::Sparked && block.consume {
            block
                .spark
                .and_then(|sid| self.state.spark(sid).output.clone())
        } else {
            None
        };

        if let Some(sid) = self.state.block(bid).spark {
            self.state.spark_mut(sid).output = None;
        }

        let mut argv = exec::split_argv(&self.state.block(bid).bin);
        if let Some(arg) = consume_arg {
            argv.push(arg.trim_end_matches(['\n', '\r']).to_string());
        }

        match self.supervisor.spawn(&argv, false, true, true) {
            Ok(child_id) => {
                self.owners.insert(child_id, Owner::Block(bid));
                let block = self.state.block_mut(bid);
                block.alive = true;
                block.last_open = now;
                block.child_id = Some(child_id);
            }
            Err(e) => {
                tracing::warn!(sid = %self.state.block(bid).sid, error = %e, "failed to spawn block");
            }
        }
    }

    async fn render_and_write(&mut self) {
        let line = lemon_compose::compose(&self.state);
        self.state.dirty = false;
        if let Err(e) = self.supervisor.write_line(self.renderer, &line).await {
            if !matches!(e, ProcessError::WouldBlock) {
                tracing::error!(error = %e, "failed to write to renderer, shutting down");
                self.fatal = Some(LoopError::RendererWrite(e));
                self.running = false;
            } else {
                // Dropped this refresh; the next dirty iteration retries.
                self.state.dirty = true;
            }
        }
    }

    fn next_wait(&self) -> Option<Duration> {
        let now = self.now();
        self.state
            .blocks
            .iter()
            .filter_map(|b| scheduling::seconds_until_due(b, now))
            .fold(None, |acc, secs| match acc {
                Some(min) if min <= secs => Some(min),
                _ => Some(secs),
            })
            .map(Duration::from_secs_f64)
    }

    fn handle_events(&mut self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::ReadReady { child, which } => self.handle_read_ready(child, which),
                Event::Hangup { child, which } => {
                    tracing::debug!(?child, ?which, "stream hangup");
                }
                Event::Exited { child, code } => self.handle_exited(child, code),
                Event::Reaped { child } => {
                    self.owners.remove(&child);
                }
            }
        }
    }

    fn handle_read_ready(&mut self, child: ChildId, which: Stream) {
        match self.owners.get(&child).copied() {
            Some(Owner::Renderer) => {
                if which == Stream::Stdout {
                    while let Ok(Some(line)) = self.supervisor.read_line(child, Stream::Stdout) {
                        let outcome = lemon_dispatch::dispatch_line(&self.state, &line);
                        match outcome {
                            lemon_dispatch::Outcome::Dispatched { .. } => {
                                tracing::debug!(?outcome, "renderer feedback");
                            }
                            lemon_dispatch::Outcome::NoCommandBound { .. }
                            | lemon_dispatch::Outcome::Malformed => {
                                tracing::warn!(?outcome, %line, "unrecognized renderer line");
                            }
                        }
                    }
                } else {
                    while let Ok(Some(line)) = self.supervisor.read_line(child, Stream::Stderr) {
                        tracing::warn!(%line, "renderer stderr");
                    }
                }
            }
            Some(Owner::Block(bid)) => {
                if which != Stream::Stdout {
                    return;
                }
                let mut latest = None;
                while let Ok(Some(line)) = self.supervisor.read_line(child, Stream::Stdout) {
                    latest = Some(line);
                }
                if let Some(line) = latest {
                    let now = self.now();
                    let block = self.state.block_mut(bid);
                    block.last_read = now;
                    if block.output != line {
                        block.output = line;
                        self.state.dirty = true;
                    }
                }
            }
            Some(Owner::Spark(sid)) => {
                if which != Stream::Stdout {
                    return;
                }
                let mut latest = None;
                while let Ok(Some(line)) = self.supervisor.read_line(child, Stream::Stdout) {
                    latest = Some(line);
                }
                if let Some(line) = latest {
                    let now = self.now();
                    self.state.spark_mut(sid).last_read = now;
                    self.state.spark_mut(sid).output = Some(line.clone());

                    if let Some(bid) = self.spark_block_if_live(sid) {
                        let block = self.state.block_mut(bid);
                        block.last_read = now;
                        if block.output != line {
                            block.output = line;
                            self.state.dirty = true;
                        }
                        self.state.spark_mut(sid).output = None;
                    }
                }
            }
            None => {}
        }
    }

    /// `Some(block)` only when the spark drives a LIVE block, in which
    /// case its line is the block's output directly rather than pending
    /// input for a later SPARKED open.
    fn spark_block_if_live(&self, sid: SparkId) -> Option<BlockId> {
        let bid = self.state.spark(sid).block;
        if self.state.block(bid).mode == Mode::Live {
            Some(bid)
        } else {
            None
        }
    }

    fn handle_exited(&mut self, child: ChildId, code: Option<i32>) {
        match self.owners.get(&child).copied() {
            Some(Owner::Renderer) => {
                tracing::error!(?code, "renderer exited, shutting down");
                self.fatal = Some(LoopError::RendererExited { code });
                self.running = false;
            }
            Some(Owner::Block(bid)) => {
                tracing::debug!(sid = %self.state.block(bid).sid, ?code, "block exited");
                let block = self.state.block_mut(bid);
                block.alive = false;
                block.child_id = None;
            }
            Some(Owner::Spark(sid)) => {
                tracing::debug!(command = %self.state.spark(sid).command, ?code, "spark exited, not restarted");
                let spark = self.state.spark_mut(sid);
                spark.alive = false;
                spark.child_id = None;
            }
            None => {}
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("shutting down");
        for id in self.owners.keys().copied().collect::<Vec<_>>() {
            let _ = self.supervisor.terminate(id);
        }

        let deadline = tokio::time::sleep(Duration::from_secs(2));
        tokio::pin!(deadline);
        while !self.owners.is_empty() {
            tokio::select! {
                _ = &mut deadline => break,
                events = self.supervisor.poll(Some(Duration::from_millis(100))) => {
                    for event in events {
                        if let Event::Reaped { child } = event {
                            self.owners.remove(&child);
                        }
                    }
                }
            }
        }

        for id in self.owners.keys().copied().collect::<Vec<_>>() {
            let _ = self.supervisor.force_kill(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemon_core::{Align, Block, Lemon, Preferences, Spark};

    fn state_with_cat_renderer() -> State {
        let mut lemon = Lemon::default();
        lemon.bin = "cat".to_string();
        State::new(lemon, Preferences::default())
    }

    #[tokio::test]
    async fn bootstrap_spawns_renderer_and_registers_owner() {
        let state = state_with_cat_renderer();
        let event_loop = EventLoop::bootstrap(state).await.unwrap();
        assert_eq!(event_loop.owners.get(&event_loop.renderer), Some(&Owner::Renderer));
    }

    #[tokio::test]
    async fn once_block_is_spawned_on_first_open_due_pass() {
        let mut state = state_with_cat_renderer();
        let mut block = Block::new("t", Align::Left);
        block.bin = "true".to_string();
        state.push_block(block);
        let mut event_loop = EventLoop::bootstrap(state).await.unwrap();

        event_loop.open_due_blocks(0.0);
        assert!(event_loop.state.block(BlockId(0)).alive);
        assert_eq!(event_loop.owners.len(), 2); // renderer + block
    }

    #[tokio::test]
    async fn sparked_block_without_pending_output_and_consume_is_not_due() {
        let mut state = state_with_cat_renderer();
        let bid = state.push_block(Block::new("s", Align::Left));
        state.block_mut(bid).mode = Mode::Sparked;
        state.block_mut(bid).consume = true;
        let sid = state.push_spark(Spark::new(bid, "true"));
        state.block_mut(bid).spark = Some(sid);

        let mut event_loop = EventLoop::bootstrap(state).await.unwrap();
        event_loop.open_due_blocks(0.0);
        assert!(!event_loop.state.block(bid).alive);
    }

    #[tokio::test]
    async fn next_wait_reflects_timed_block_remaining_time() {
        let mut state = state_with_cat_renderer();
        let bid = state.push_block(Block::new("t", Align::Left));
        state.block_mut(bid).mode = Mode::Timed;
        state.block_mut(bid).reload = 1.0;
        state.block_mut(bid).last_open = 0.0;

        let event_loop = EventLoop::bootstrap(state).await.unwrap();
        // last_open == 0.0 means "never opened", so seconds_until_due is None
        // (is_due is already true) and next_wait is None here.
        assert_eq!(event_loop.next_wait(), None);
    }
}
