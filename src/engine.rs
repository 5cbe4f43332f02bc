use std::io;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::rngs::StdRng;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::action::{Action, InputLine};
use crate::cast::{CommentOverlay, EventStream, OverlayPosition};
use crate::config::SessionConfig;
use crate::delay::DelayModel;
use crate::error::{RecordError, SessionError};
use crate::recorder::{Recorder, Stamp};

/// A live interactive terminal the typist writes to.
#[async_trait(?Send)]
pub trait Terminal {
    /// Write bytes to the program's input.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// `false` once the program behind the terminal has exited.
    fn is_alive(&mut self) -> bool;

    /// Hang up and wait for the program to exit.
    async fn close(&mut self) -> io::Result<()>;
}

/// Types a script into a terminal at human pace while the recorder runs.
pub struct Typist<T, R, G = StdRng> {
    config: SessionConfig,
    terminal: T,
    recorder: R,
    delays: DelayModel<G>,
    started: Instant,
    scheduled: Duration,
    last_post_nl: Duration,
    completed: Option<usize>,
    closed: bool,
}

impl<T: Terminal, R: Recorder, G: Rng> Typist<T, R, G> {
    /// Session time starts now; create the typist right after the recorder
    /// has been started in `terminal`.
    pub fn new(config: SessionConfig, terminal: T, recorder: R, delays: DelayModel<G>) -> Self {
        Self {
            config,
            terminal,
            recorder,
            delays,
            started: Instant::now(),
            scheduled: Duration::ZERO,
            last_post_nl: Duration::ZERO,
            completed: None,
            closed: false,
        }
    }

    /// Wall-clock time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sum of all pauses taken so far.
    pub fn scheduled(&self) -> Duration {
        self.scheduled
    }

    /// Index of the last action that finished.
    pub fn completed(&self) -> Option<usize> {
        self.completed
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Perform every action in order, then close the terminal.
    pub async fn run(&mut self, actions: &[Action]) -> Result<(), SessionError> {
        info!(actions = actions.len(), "typing script");
        self.pause(self.config.start_delay).await;

        for (index, action) in actions.iter().enumerate() {
            if !self.terminal.is_alive() {
                warn!(index, "terminal exited before the script finished");
                return Err(SessionError::Terminated {
                    completed: self.completed,
                });
            }
            self.perform(index, action).await?;
            self.completed = Some(index);
        }

        self.pause(self.config.end_delay).await;
        self.close().await?;
        info!(elapsed = self.elapsed().as_secs_f64(), "script finished");
        Ok(())
    }

    /// Close the terminal after an interrupted run.
    pub async fn abort(&mut self) -> Result<(), SessionError> {
        warn!(completed = ?self.completed, "aborting session");
        self.close().await
    }

    /// Stop the recorder and hand back the recorded session.
    pub async fn finish(mut self) -> Result<EventStream, RecordError> {
        self.recorder.stop().await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.terminal.close().await.map_err(SessionError::Close)
    }

    async fn perform(&mut self, index: usize, action: &Action) -> Result<(), SessionError> {
        match action {
            Action::Input(line) => {
                debug!(index, text = %line.text, "typing line");
                self.type_line(line).await
            }
            Action::Marker { label } => {
                let stamp = Stamp::marker(self.stamp_time(), label.clone());
                debug!(index, label = %label, time = stamp.time, "marker");
                self.stamp(stamp)
            }
            Action::Comment { text } => {
                if !self.config.with_comments {
                    debug!(index, "comments disabled, skipping");
                    return Ok(());
                }
                let position = OverlayPosition::from_top(self.config.comments_at_top);
                let overlay = CommentOverlay::new(text.clone(), position);
                let stamp = Stamp::comment(self.stamp_time(), overlay);
                debug!(index, text = %text, time = stamp.time, "comment");
                self.stamp(stamp)
            }
        }
    }

    async fn type_line(&mut self, line: &InputLine) -> Result<(), SessionError> {
        let mut buf = [0u8; 4];
        for ch in line.text.chars() {
            let delay = self.delays.sample(&self.config.typing_delay);
            self.pause(delay).await;
            self.send(ch.encode_utf8(&mut buf).as_bytes())?;
        }

        let pre_nl = line.pre_nl_delay.unwrap_or(self.config.pre_nl_delay);
        let delay = self.delays.sample(&pre_nl);
        self.pause(delay).await;
        self.send(b"\n")?;

        let post_nl = line.post_nl_delay.unwrap_or(self.config.post_nl_delay);
        let delay = self.delays.sample(&post_nl);
        self.pause(delay).await;
        self.last_post_nl = delay;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.terminal.send(data).map_err(|source| SessionError::Write {
            completed: self.completed,
            source,
        })
    }

    fn stamp(&mut self, stamp: Stamp) -> Result<(), SessionError> {
        self.recorder.stamp(stamp).map_err(|source| SessionError::Stamp {
            completed: self.completed,
            source,
        })
    }

    async fn pause(&mut self, delay: Duration) {
        self.scheduled += delay;
        sleep(delay).await;
    }

    /// Markers land inside the preceding post-newline pause, so they show up
    /// before the next line starts rather than with it.
    fn stamp_time(&self) -> f64 {
        let lead = self.last_post_nl.as_secs_f64() * self.config.marker_lead;
        let time = (self.elapsed().as_secs_f64() - lead).max(0.0);
        (time * 1000.0).round() / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::{EventKind, Header};
    use crate::config::DelayRange;
    use crate::recorder::StampLog;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every write with the session time it happened at.
    #[derive(Default)]
    struct FakeTerminal {
        started: Option<Instant>,
        writes: Rc<RefCell<Vec<(Duration, Vec<u8>)>>>,
        die_after: Option<usize>,
        fail_writes: bool,
        closed: Rc<RefCell<bool>>,
    }

    impl FakeTerminal {
        fn new() -> Self {
            Self {
                started: Some(Instant::now()),
                ..Self::default()
            }
        }

        fn typed(&self) -> String {
            let writes = self.writes.borrow();
            String::from_utf8(writes.iter().flat_map(|(_, b)| b.clone()).collect()).unwrap()
        }
    }

    #[async_trait(?Send)]
    impl Terminal for FakeTerminal {
        fn send(&mut self, data: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pty closed"));
            }
            let at = self.started.map(|s| s.elapsed()).unwrap_or_default();
            self.writes.borrow_mut().push((at, data.to_vec()));
            Ok(())
        }

        fn is_alive(&mut self) -> bool {
            match self.die_after {
                Some(limit) => self.writes.borrow().len() < limit,
                None => true,
            }
        }

        async fn close(&mut self) -> io::Result<()> {
            *self.closed.borrow_mut() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryRecorder {
        log: StampLog,
    }

    #[async_trait(?Send)]
    impl Recorder for MemoryRecorder {
        fn stamp(&mut self, stamp: Stamp) -> Result<(), RecordError> {
            self.log.push(stamp)
        }

        async fn stop(&mut self) -> Result<EventStream, RecordError> {
            Ok(EventStream::from_events(Header::new(80, 24), self.log.close()?))
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fixed_config() -> SessionConfig {
        SessionConfig {
            typing_delay: DelayRange::fixed(ms(50)),
            pre_nl_delay: DelayRange::fixed(ms(200)),
            post_nl_delay: DelayRange::fixed(ms(1000)),
            ..SessionConfig::default()
        }
    }

    fn new_typist(
        config: SessionConfig,
        terminal: FakeTerminal,
    ) -> Typist<FakeTerminal, MemoryRecorder> {
        Typist::new(config, terminal, MemoryRecorder::default(), DelayModel::seeded(7))
    }

    #[tokio::test(start_paused = true)]
    async fn test_types_line_with_exact_timing() {
        let terminal = FakeTerminal::new();
        let writes = terminal.writes.clone();
        let closed = terminal.closed.clone();
        let mut typist = new_typist(fixed_config(), terminal);

        typist.run(&[Action::input("ls")]).await.unwrap();
        assert_eq!(typist.terminal().typed(), "ls\n");

        let writes = writes.borrow();
        let times: Vec<Duration> = writes.iter().map(|(t, _)| *t).collect();
        // start 300, 'l' +50, 's' +50, pre_nl +200
        assert_eq!(times, vec![ms(350), ms(400), ms(600)]);
        assert_eq!(writes[2].1, b"\n");
        // + post_nl 1000 + end 500
        assert_eq!(typist.scheduled(), ms(2100));
        assert_eq!(typist.elapsed(), ms(2100));
        assert_eq!(typist.completed(), Some(0));
        assert!(*closed.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_overrides_take_precedence() {
        let mut typist = new_typist(fixed_config(), FakeTerminal::new());
        let line = InputLine::new("x")
            .with_delays(DelayRange::fixed(ms(1000)), DelayRange::fixed(ms(3000)));

        typist.run(&[Action::Input(line)]).await.unwrap();
        assert_eq!(typist.scheduled(), ms(300 + 50 + 1000 + 3000 + 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_time_matches_seeded_samples() {
        let config = SessionConfig::default();
        let actions = [Action::input("echo hi"), Action::input("exit")];
        let mut typist = new_typist(config.clone(), FakeTerminal::new());
        typist.run(&actions).await.unwrap();

        let mut replay = DelayModel::seeded(7);
        let mut expected = config.start_delay + config.end_delay;
        for text in ["echo hi", "exit"] {
            for _ in text.chars() {
                expected += replay.sample(&config.typing_delay);
            }
            expected += replay.sample(&config.pre_nl_delay);
            expected += replay.sample(&config.post_nl_delay);
        }
        assert_eq!(typist.scheduled(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unicode_is_sent_per_character() {
        let terminal = FakeTerminal::new();
        let writes = terminal.writes.clone();
        let mut typist = new_typist(fixed_config(), terminal);
        typist.run(&[Action::input("héllo ✓")]).await.unwrap();

        let writes = writes.borrow();
        assert_eq!(writes.len(), 8);
        assert_eq!(writes[1].1, "é".as_bytes());
        assert_eq!(writes[6].1, "✓".as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_marker_is_stamped_inside_previous_pause() {
        let mut typist = new_typist(fixed_config(), FakeTerminal::new());
        typist
            .run(&[Action::marker("start"), Action::input("ls"), Action::marker("after ls")])
            .await
            .unwrap();

        let stream = typist.finish().await.unwrap();
        let markers: Vec<(f64, &str)> = stream.markers().collect();
        // 1.6s elapsed after "ls", minus 0.8 * 1.0s
        assert_eq!(markers, vec![(0.3, "start"), (0.8, "after ls")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_marker_lead_stamps_at_elapsed_time() {
        let config = SessionConfig {
            marker_lead: 0.0,
            ..fixed_config()
        };
        let mut typist = new_typist(config, FakeTerminal::new());
        typist.run(&[Action::input("ls"), Action::marker("m")]).await.unwrap();
        let stream = typist.finish().await.unwrap();
        assert_eq!(stream.markers().next(), Some((1.6, "m")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_comments_follow_config() {
        let terminal = FakeTerminal::new();
        let writes = terminal.writes.clone();
        let mut typist = new_typist(fixed_config(), terminal);
        typist.run(&[Action::comment("hello")]).await.unwrap();
        assert!(writes.borrow().is_empty());
        assert!(typist.finish().await.unwrap().is_empty());

        let config = SessionConfig {
            with_comments: true,
            comments_at_top: true,
            ..fixed_config()
        };
        let mut typist = new_typist(config, FakeTerminal::new());
        typist.run(&[Action::comment("hello")]).await.unwrap();
        assert_eq!(typist.scheduled(), ms(800));
        let stream = typist.finish().await.unwrap();
        assert_eq!(
            stream.events()[0].kind(),
            &EventKind::Comment(CommentOverlay::new("hello", OverlayPosition::Top))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_terminal_reports_progress() {
        let terminal = FakeTerminal {
            die_after: Some(3),
            ..FakeTerminal::new()
        };
        let mut typist = new_typist(fixed_config(), terminal);
        let err = typist
            .run(&[Action::input("ls"), Action::marker("m"), Action::input("pwd")])
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Terminated { completed: Some(0) }));
        // The recorder still holds nothing from the unfinished part.
        assert!(typist.finish().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_session_error() {
        let terminal = FakeTerminal {
            fail_writes: true,
            ..FakeTerminal::new()
        };
        let mut typist = new_typist(fixed_config(), terminal);
        let err = typist.run(&[Action::input("ls")]).await.unwrap_err();
        assert!(matches!(err, SessionError::Write { completed: None, .. }));
        assert_eq!(err.completed(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_closes_terminal_once() {
        let terminal = FakeTerminal::new();
        let closed = terminal.closed.clone();
        let mut typist = new_typist(fixed_config(), terminal);

        let actions = [Action::input("sleep 100")];
        let run = typist.run(&actions);
        let interrupted = tokio::time::timeout(ms(500), run).await;
        assert!(interrupted.is_err());

        typist.abort().await.unwrap();
        assert!(*closed.borrow());
        assert_eq!(typist.completed(), None);
        typist.abort().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stamps_after_stop_are_rejected() {
        let mut recorder = MemoryRecorder::default();
        recorder.stop().await.unwrap();
        let mut typist =
            Typist::new(fixed_config(), FakeTerminal::new(), recorder, DelayModel::seeded(1));
        let err = typist.run(&[Action::marker("late")]).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Stamp {
                source: RecordError::Stopped,
                ..
            }
        ));
    }
}
