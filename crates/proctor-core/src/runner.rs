//! The session event loop.
//!
//! Drives a [`SessionController`] from three sources: lines of user input,
//! timers, and responses to API calls. API calls run as futures owned by the
//! loop itself, so a slow request (the coding prefetch, a test run) never
//! blocks the countdown. Everything happens on the calling task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::controller::{CodingView, Effect, Event, QuestionView, Screen, SessionController};
use crate::error::SessionError;
use crate::input::{parse_command, Command};
use crate::model::{SubmissionPayload, SubmitResult, TestCodeOutcome};
use crate::timer::{Clock, Scheduler, TimerKind};
use crate::traits::AssessmentApi;

/// Countdown refresh period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Presentation of the session. Implemented by the terminal UI.
pub trait View {
    fn show_start(&mut self, duration_minutes: u32, total_questions: Option<u32>);
    fn show_validation(&mut self, message: &str);
    fn show_question(&mut self, question: &QuestionView);
    fn show_coding(&mut self, coding: &CodingView);
    fn show_editor(&mut self, code: &str);
    fn show_countdown(&mut self, remaining: Duration);
    fn show_test_report(&mut self, outcome: &TestCodeOutcome);
    fn alert(&mut self, message: &str);
    fn show_result(&mut self, result: &SubmitResult);
}

/// A view that displays nothing.
pub struct NoopView;

impl View for NoopView {
    fn show_start(&mut self, _: u32, _: Option<u32>) {}
    fn show_validation(&mut self, _: &str) {}
    fn show_question(&mut self, _: &QuestionView) {}
    fn show_coding(&mut self, _: &CodingView) {}
    fn show_editor(&mut self, _: &str) {}
    fn show_countdown(&mut self, _: Duration) {}
    fn show_test_report(&mut self, _: &TestCodeOutcome) {}
    fn alert(&mut self, _: &str) {}
    fn show_result(&mut self, _: &SubmitResult) {}
}

/// A successfully submitted session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub candidate_name: String,
    pub payload: SubmissionPayload,
    pub result: SubmitResult,
}

/// Runs one assessment session to completion.
pub struct SessionRunner<V> {
    controller: SessionController,
    api: Arc<dyn AssessmentApi>,
    clock: Arc<dyn Clock>,
    timers: Scheduler,
    ticker_active: bool,
    tick_interval: Duration,
    view: V,
    in_flight: FuturesUnordered<BoxFuture<'static, Option<Event>>>,
    /// Result recording, the only request still awaited after the
    /// submission resolves.
    records: FuturesUnordered<BoxFuture<'static, ()>>,
}

impl<V: View> SessionRunner<V> {
    pub fn new(
        controller: SessionController,
        api: Arc<dyn AssessmentApi>,
        clock: Arc<dyn Clock>,
        view: V,
    ) -> Self {
        Self {
            controller,
            api,
            clock,
            timers: Scheduler::new(),
            ticker_active: false,
            tick_interval: DEFAULT_TICK_INTERVAL,
            view,
            in_flight: FuturesUnordered::new(),
            records: FuturesUnordered::new(),
        }
    }

    /// Set the countdown refresh period.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Fetch the remote config and show the start screen. Failures fall
    /// back to defaults.
    pub async fn load_config(&mut self) {
        let config = match self.api.config().await {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to load config");
                None
            }
        };
        self.dispatch(Event::ConfigLoaded(config));
    }

    /// Run until the submission has been answered.
    ///
    /// Each line received on `input` is interpreted against the current
    /// screen. Input is held back while a session start or the submission
    /// is in flight. Once `input` closes the session still runs on to its
    /// deadline. Requests still pending when the submission resolves are
    /// dropped, except result recording.
    pub async fn run(
        &mut self,
        input: &mut mpsc::Receiver<String>,
    ) -> Result<SessionOutcome, SessionError> {
        if self.controller.screen() == Screen::Idle {
            self.load_config().await;
        }

        let mut input_open = true;
        loop {
            if self.controller.is_finished() {
                if !self.in_flight.is_empty() {
                    debug!(
                        dropped = self.in_flight.len(),
                        "dropping requests superseded by the submission"
                    );
                    self.in_flight = FuturesUnordered::new();
                }
                if self.records.is_empty() {
                    break;
                }
            }
            let next_due = self.timers.next_due();
            if !input_open
                && next_due.is_none()
                && self.in_flight.is_empty()
                && self.records.is_empty()
            {
                return Err(SessionError::InputClosed);
            }
            let wait = next_due
                .map(|due| (due - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::ZERO);
            let read_input = input_open && !self.controller.is_waiting_on_server();

            tokio::select! {
                biased;

                Some(event) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    if let Some(event) = event {
                        self.dispatch(event);
                    }
                }
                Some(()) = self.records.next(), if !self.records.is_empty() => {}
                () = tokio::time::sleep(wait), if next_due.is_some() => self.fire_timers(),
                line = input.recv(), if read_input => match line {
                    Some(line) => self.handle_line(&line).await,
                    None => {
                        debug!("input closed");
                        input_open = false;
                    }
                },
                else => break,
            }
        }

        self.outcome()
    }

    /// Feed one event through the controller and carry out its effects.
    pub fn dispatch(&mut self, event: Event) {
        for effect in self.controller.handle(event) {
            self.apply(effect);
        }
    }

    fn fire_timers(&mut self) {
        let now = self.clock.now();
        for kind in self.timers.fire_due(now) {
            match kind {
                TimerKind::Tick => {
                    // Re-arm first so a StopTicker from this tick cancels it.
                    if self.ticker_active {
                        let due = after(now, self.tick_interval);
                        self.timers.schedule(TimerKind::Tick, due);
                    }
                    self.dispatch(Event::Tick { now });
                }
                TimerKind::Advance => self.dispatch(Event::AdvanceElapsed),
            }
        }
    }

    async fn handle_line(&mut self, line: &str) {
        let Some(command) = parse_command(self.controller.screen(), line) else {
            return;
        };
        let event = match command {
            Command::Start { name } => Event::StartRequested { name },
            Command::Choose(index) => Event::ChoiceSelected { index },
            Command::Back => Event::PreviousQuestion,
            Command::AppendLine(line) => Event::EditorAppended { line },
            Command::RunTests => Event::RunTestsRequested,
            Command::Submit => Event::SubmitRequested {
                now: self.clock.now(),
            },
            Command::ResetEditor => Event::EditorReset,
            Command::ShowEditor => Event::ShowEditor,
            Command::LoadFile(path) => match tokio::fs::read_to_string(&path).await {
                Ok(text) => Event::EditorReplaced { text },
                Err(e) => {
                    let message = format!("Could not read {}: {e}", path.display());
                    self.view.alert(&message);
                    return;
                }
            },
            Command::Unrecognized(message) => {
                self.view.show_validation(&message);
                return;
            }
        };
        self.dispatch(event);
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::CreateSession { name } => {
                let api = Arc::clone(&self.api);
                self.spawn(async move {
                    Some(match api.start(&name).await {
                        Ok(response) => Event::SessionCreated {
                            session_id: response.session_id,
                        },
                        Err(e) => Event::StartFailed {
                            message: format!("{e:#}"),
                        },
                    })
                });
            }
            Effect::FetchQuestions { session_id } => {
                let api = Arc::clone(&self.api);
                let clock = Arc::clone(&self.clock);
                self.spawn(async move {
                    Some(match api.questions(&session_id).await {
                        Ok(questions) => Event::QuestionsLoaded {
                            questions,
                            now: clock.now(),
                        },
                        Err(e) => Event::StartFailed {
                            message: format!("{e:#}"),
                        },
                    })
                });
            }
            Effect::PrefetchCoding => {
                let api = Arc::clone(&self.api);
                self.spawn(async move {
                    let coding = api.coding().await.unwrap_or_else(|e| {
                        warn!(error = %format!("{e:#}"), "coding exercise unavailable");
                        None
                    });
                    Some(Event::CodingLoaded(coding))
                });
            }
            Effect::TestCode(request) => {
                let api = Arc::clone(&self.api);
                self.spawn(async move {
                    let outcome = api.test_code(&request).await.map_err(|e| format!("{e:#}"));
                    Some(Event::TestsCompleted(outcome))
                });
            }
            Effect::Submit(payload) => {
                let api = Arc::clone(&self.api);
                self.spawn(async move {
                    let result = api.submit(&payload).await.map_err(|e| format!("{e:#}"));
                    Some(Event::SubmitCompleted(result))
                });
            }
            Effect::RecordResult(record) => {
                let api = Arc::clone(&self.api);
                self.records.push(
                    async move {
                        if let Err(e) = api.record_result(&record).await {
                            warn!(error = %format!("{e:#}"), "failed to record result");
                        }
                    }
                    .boxed(),
                );
            }

            Effect::StartTicker => {
                self.ticker_active = true;
                let due = after(self.clock.now(), self.tick_interval);
                self.timers.schedule(TimerKind::Tick, due);
            }
            Effect::StopTicker => {
                self.ticker_active = false;
                self.timers.cancel(TimerKind::Tick);
            }
            Effect::ScheduleAdvance { delay } => {
                let due = after(self.clock.now(), delay);
                self.timers.schedule(TimerKind::Advance, due);
            }
            Effect::CancelAdvance => {
                if self.timers.cancel(TimerKind::Advance) {
                    debug!("pending advance cancelled");
                }
            }

            Effect::RenderStart {
                duration_minutes,
                total_questions,
            } => self.view.show_start(duration_minutes, total_questions),
            Effect::ShowValidation(message) => self.view.show_validation(&message),
            Effect::RenderQuestion(question) => self.view.show_question(&question),
            Effect::RenderCoding(coding) => self.view.show_coding(&coding),
            Effect::RenderEditor { code } => self.view.show_editor(&code),
            Effect::RenderCountdown(remaining) => self.view.show_countdown(remaining),
            Effect::ShowTestReport(outcome) => self.view.show_test_report(&outcome),
            Effect::Alert(message) => self.view.alert(&message),
            Effect::ShowResult(result) => self.view.show_result(&result),
        }
    }

    fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = Option<Event>> + Send + 'static,
    {
        self.in_flight.push(future.boxed());
    }

    fn outcome(&self) -> Result<SessionOutcome, SessionError> {
        match (
            self.controller.session(),
            self.controller.payload(),
            self.controller.result(),
        ) {
            (Some(session), Some(payload), Some(result)) => Ok(SessionOutcome {
                session_id: session.id.clone(),
                candidate_name: self
                    .controller
                    .candidate_name()
                    .unwrap_or_default()
                    .to_string(),
                payload: payload.clone(),
                result: result.clone(),
            }),
            _ => Err(SessionError::SubmitFailed(
                self.controller
                    .submit_error()
                    .unwrap_or("no response from server")
                    .to_string(),
            )),
        }
    }
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero())
}
