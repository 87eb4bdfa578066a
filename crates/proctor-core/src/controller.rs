//! The session state machine.
//!
//! [`SessionController::handle`] is the only way state changes. It performs
//! no I/O and never reads a clock; it returns the [`Effect`]s the runner has
//! to carry out (API calls, timer changes, renders). Time-dependent events
//! carry their own `now`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::model::{
    AnswerMap, CodingExercise, Config, Question, ResultRecord, Session, SubmissionPayload,
    SubmitResult, TestCodeOutcome, TestCodeRequest,
};
use crate::timer::Deadline;

/// Indent of the empty body line the editor is seeded with.
const BODY_INDENT: &str = "    ";

/// Behaviour switches for the controller.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Feedback window between a click and the next question. Zero advances
    /// immediately.
    pub advance_delay: Duration,
    /// Allow stepping back to an earlier question.
    pub allow_back_navigation: bool,
    /// Post a scored record to `/api/submit_result` after a successful submit.
    pub record_results: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(1000),
            allow_back_navigation: false,
            record_results: false,
        }
    }
}

/// Which screen the candidate is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Idle,
    AwaitingName,
    InQuestion(usize),
    InCoding,
    Submitted,
}

/// Guards the single submission a session is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitGuard {
    NotSubmitted,
    Submitting,
    Submitted,
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    DeadlineExpired,
}

/// Inputs to the state machine: user actions, timer firings, API responses.
#[derive(Debug, Clone)]
pub enum Event {
    /// `None` when the config fetch failed; defaults apply.
    ConfigLoaded(Option<Config>),
    StartRequested {
        name: String,
    },
    SessionCreated {
        session_id: String,
    },
    /// Creating the session or loading its questions failed.
    StartFailed {
        message: String,
    },
    QuestionsLoaded {
        questions: Vec<Question>,
        now: DateTime<Utc>,
    },
    /// `None` when no exercise is configured or the fetch failed.
    CodingLoaded(Option<CodingExercise>),
    ChoiceSelected {
        index: usize,
    },
    AdvanceElapsed,
    PreviousQuestion,
    EditorReplaced {
        text: String,
    },
    EditorAppended {
        line: String,
    },
    EditorReset,
    ShowEditor,
    RunTestsRequested,
    TestsCompleted(Result<TestCodeOutcome, String>),
    SubmitRequested {
        now: DateTime<Utc>,
    },
    Tick {
        now: DateTime<Utc>,
    },
    SubmitCompleted(Result<SubmitResult, String>),
}

/// A question as it should be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub question: Question,
    /// Previously recorded choice for this question, if any.
    pub selected: Option<usize>,
}

/// The coding screen as it should be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingView {
    pub exercise: Option<CodingExercise>,
    pub code: String,
}

/// Side effects requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateSession { name: String },
    FetchQuestions { session_id: String },
    PrefetchCoding,
    TestCode(TestCodeRequest),
    Submit(SubmissionPayload),
    RecordResult(ResultRecord),

    StartTicker,
    StopTicker,
    ScheduleAdvance { delay: Duration },
    CancelAdvance,

    RenderStart {
        duration_minutes: u32,
        total_questions: Option<u32>,
    },
    ShowValidation(String),
    RenderQuestion(QuestionView),
    RenderCoding(CodingView),
    RenderEditor { code: String },
    RenderCountdown(Duration),
    ShowTestReport(TestCodeOutcome),
    Alert(String),
    ShowResult(SubmitResult),
}

/// Owns all session state and drives the screen sequence.
#[derive(Debug)]
pub struct SessionController {
    options: ControllerOptions,
    config: Config,
    screen: Screen,
    candidate_name: Option<String>,
    starting: bool,
    pending_session_id: Option<String>,
    session: Option<Session>,
    deadline: Option<Deadline>,
    questions: Vec<Question>,
    answers: AnswerMap,
    coding: Option<CodingExercise>,
    code: Option<String>,
    editor_dirty: bool,
    advancing: bool,
    guard: SubmitGuard,
    payload: Option<SubmissionPayload>,
    result: Option<SubmitResult>,
    submit_error: Option<String>,
}

impl SessionController {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            options,
            config: Config::default(),
            screen: Screen::Idle,
            candidate_name: None,
            starting: false,
            pending_session_id: None,
            session: None,
            deadline: None,
            questions: Vec::new(),
            answers: AnswerMap::new(),
            coding: None,
            code: None,
            editor_dirty: false,
            advancing: false,
            guard: SubmitGuard::NotSubmitted,
            payload: None,
            result: None,
            submit_error: None,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn candidate_name(&self) -> Option<&str> {
        self.candidate_name.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn coding(&self) -> Option<&CodingExercise> {
        self.coding.as_ref()
    }

    /// Editor content; `None` until the coding screen has been opened.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn submit_guard(&self) -> SubmitGuard {
        self.guard
    }

    pub fn payload(&self) -> Option<&SubmissionPayload> {
        self.payload.as_ref()
    }

    pub fn result(&self) -> Option<&SubmitResult> {
        self.result.as_ref()
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// True once the submission has been answered, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.guard == SubmitGuard::Submitted
    }

    /// True while a session exists or is being created.
    pub fn has_started(&self) -> bool {
        self.starting || self.session.is_some()
    }

    /// True while the screen cannot change until the server answers
    /// (session start, submission).
    pub fn is_waiting_on_server(&self) -> bool {
        self.starting || self.guard == SubmitGuard::Submitting
    }

    /// Apply one event and return the effects it requires.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::ConfigLoaded(config) => self.on_config_loaded(config),
            Event::StartRequested { name } => self.on_start_requested(&name),
            Event::SessionCreated { session_id } => self.on_session_created(session_id),
            Event::StartFailed { message } => self.on_start_failed(&message),
            Event::QuestionsLoaded { questions, now } => self.on_questions_loaded(questions, now),
            Event::CodingLoaded(coding) => self.on_coding_loaded(coding),
            Event::ChoiceSelected { index } => self.on_choice_selected(index),
            Event::AdvanceElapsed => self.on_advance_elapsed(),
            Event::PreviousQuestion => self.on_previous_question(),
            Event::EditorReplaced { text } => self.on_editor_replaced(text),
            Event::EditorAppended { line } => self.on_editor_appended(&line),
            Event::EditorReset => self.on_editor_reset(),
            Event::ShowEditor => self.on_show_editor(),
            Event::RunTestsRequested => self.on_run_tests(),
            Event::TestsCompleted(outcome) => self.on_tests_completed(outcome),
            Event::SubmitRequested { now } => self.on_submit_requested(now),
            Event::Tick { now } => self.on_tick(now),
            Event::SubmitCompleted(result) => self.on_submit_completed(result),
        }
    }

    fn on_config_loaded(&mut self, config: Option<Config>) -> Vec<Effect> {
        if self.screen != Screen::Idle {
            return vec![];
        }
        self.config = config.unwrap_or_else(|| {
            warn!("config unavailable, using defaults");
            Config::default()
        });
        self.screen = Screen::AwaitingName;
        vec![Effect::RenderStart {
            duration_minutes: self.config.duration_minutes(),
            total_questions: self.config.total_mcq,
        }]
    }

    fn on_start_requested(&mut self, name: &str) -> Vec<Effect> {
        if !matches!(self.screen, Screen::Idle | Screen::AwaitingName) || self.starting {
            return vec![];
        }
        let name = name.trim();
        if name.is_empty() {
            return vec![Effect::ShowValidation(
                "Please enter your name to begin.".to_string(),
            )];
        }
        self.starting = true;
        self.candidate_name = Some(name.to_string());
        info!(candidate = name, "starting session");
        vec![Effect::CreateSession {
            name: name.to_string(),
        }]
    }

    fn on_session_created(&mut self, session_id: String) -> Vec<Effect> {
        if !self.starting {
            return vec![];
        }
        debug!(%session_id, "session created");
        self.pending_session_id = Some(session_id.clone());
        vec![Effect::FetchQuestions { session_id }]
    }

    fn on_start_failed(&mut self, message: &str) -> Vec<Effect> {
        if !self.starting {
            return vec![];
        }
        self.starting = false;
        self.pending_session_id = None;
        self.screen = Screen::AwaitingName;
        vec![Effect::Alert(format!("Error starting the test: {message}"))]
    }

    fn on_questions_loaded(&mut self, questions: Vec<Question>, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.starting {
            return vec![];
        }
        let Some(session_id) = self.pending_session_id.take() else {
            return vec![];
        };
        self.starting = false;

        let deadline = Deadline::after(now, self.config.duration_minutes());
        info!(
            %session_id,
            questions = questions.len(),
            deadline = %deadline.at(),
            "session started"
        );
        self.session = Some(Session {
            id: session_id,
            started_at: now,
        });
        self.deadline = Some(deadline);
        self.questions = questions;

        let mut effects = vec![
            Effect::StartTicker,
            Effect::PrefetchCoding,
            Effect::RenderCountdown(deadline.remaining(now)),
        ];
        if self.questions.is_empty() {
            effects.extend(self.enter_coding());
        } else {
            effects.extend(self.enter_question(0));
        }
        effects
    }

    fn on_coding_loaded(&mut self, coding: Option<CodingExercise>) -> Vec<Effect> {
        if self.guard != SubmitGuard::NotSubmitted {
            return vec![];
        }
        self.coding = coding;
        // The exercise can arrive after the candidate reached the coding
        // screen; refresh it unless they already typed something.
        if self.screen == Screen::InCoding && !self.editor_dirty {
            self.code = Some(self.seed_code());
            return vec![Effect::RenderCoding(self.coding_view())];
        }
        vec![]
    }

    fn on_choice_selected(&mut self, index: usize) -> Vec<Effect> {
        let Screen::InQuestion(current) = self.screen else {
            return vec![];
        };
        if self.advancing {
            debug!(index, "choice ignored during feedback window");
            return vec![];
        }
        let Some(question) = self.questions.get(current) else {
            return vec![];
        };
        if index >= question.choices.len() {
            return vec![Effect::ShowValidation(format!(
                "Choose an option between 1 and {}.",
                question.choices.len()
            ))];
        }

        self.answers.record(&question.id, index);
        debug!(qid = %question.id, index, "answer recorded");

        if self.options.advance_delay.is_zero() {
            return self.advance();
        }
        self.advancing = true;
        vec![Effect::ScheduleAdvance {
            delay: self.options.advance_delay,
        }]
    }

    fn on_advance_elapsed(&mut self) -> Vec<Effect> {
        if !self.advancing || !matches!(self.screen, Screen::InQuestion(_)) {
            debug!("stale advance timer ignored");
            return vec![];
        }
        self.advancing = false;
        self.advance()
    }

    fn advance(&mut self) -> Vec<Effect> {
        let Screen::InQuestion(current) = self.screen else {
            return vec![];
        };
        if current + 1 < self.questions.len() {
            self.enter_question(current + 1)
        } else {
            self.enter_coding()
        }
    }

    fn on_previous_question(&mut self) -> Vec<Effect> {
        if !self.options.allow_back_navigation || self.advancing {
            return vec![];
        }
        match self.screen {
            Screen::InQuestion(current) if current > 0 => self.enter_question(current - 1),
            Screen::InCoding if !self.questions.is_empty() => {
                self.enter_question(self.questions.len() - 1)
            }
            _ => vec![],
        }
    }

    fn enter_question(&mut self, index: usize) -> Vec<Effect> {
        self.screen = Screen::InQuestion(index);
        self.advancing = false;
        let question = self.questions[index].clone();
        let selected = self.answers.get(&question.id);
        vec![Effect::RenderQuestion(QuestionView {
            index,
            total: self.questions.len(),
            question,
            selected,
        })]
    }

    fn enter_coding(&mut self) -> Vec<Effect> {
        self.screen = Screen::InCoding;
        self.advancing = false;
        if self.code.is_none() {
            self.code = Some(self.seed_code());
        }
        vec![Effect::RenderCoding(self.coding_view())]
    }

    /// The signature followed by an indented empty body line, so the first
    /// typed line lands inside the function.
    fn seed_code(&self) -> String {
        let Some(signature) = self
            .coding
            .as_ref()
            .map(|c| c.function_signature.as_str())
            .filter(|s| !s.trim().is_empty())
        else {
            return String::new();
        };
        let mut seed = signature.to_string();
        if !seed.ends_with('\n') {
            seed.push('\n');
        }
        seed.push_str(BODY_INDENT);
        seed
    }

    fn coding_view(&self) -> CodingView {
        CodingView {
            exercise: self.coding.clone(),
            code: self.code.clone().unwrap_or_default(),
        }
    }

    fn on_editor_replaced(&mut self, text: String) -> Vec<Effect> {
        if !self.editing() {
            return vec![];
        }
        self.code = Some(text.clone());
        self.editor_dirty = true;
        vec![Effect::RenderEditor { code: text }]
    }

    fn on_editor_appended(&mut self, line: &str) -> Vec<Effect> {
        if !self.editing() {
            return vec![];
        }
        let code = self.code.get_or_insert_with(String::new);
        // A whitespace-only last line is the pending body indent of the
        // seed. The typed line fills it, keeping its own indent if deeper.
        let partial = code.rsplit('\n').next().unwrap_or_default();
        if !partial.is_empty() && partial.trim().is_empty() {
            let indent = partial.len();
            if line.starts_with(&code[code.len() - indent..]) {
                code.truncate(code.len() - indent);
            }
            code.push_str(line);
        } else {
            if !code.is_empty() && !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(line);
        }
        code.push('\n');
        self.editor_dirty = true;
        vec![]
    }

    fn on_editor_reset(&mut self) -> Vec<Effect> {
        if !self.editing() {
            return vec![];
        }
        let seed = self.seed_code();
        self.code = Some(seed.clone());
        self.editor_dirty = false;
        vec![Effect::RenderEditor { code: seed }]
    }

    fn on_show_editor(&mut self) -> Vec<Effect> {
        if !self.editing() {
            return vec![];
        }
        vec![Effect::RenderEditor {
            code: self.code.clone().unwrap_or_default(),
        }]
    }

    fn editing(&self) -> bool {
        self.screen == Screen::InCoding && self.guard == SubmitGuard::NotSubmitted
    }

    fn on_run_tests(&mut self) -> Vec<Effect> {
        if !self.editing() {
            return vec![];
        }
        let code = self.code.as_deref().unwrap_or_default().trim();
        if code.is_empty() {
            return vec![Effect::Alert("Please enter some code first!".to_string())];
        }
        let Some(session) = &self.session else {
            return vec![];
        };
        vec![Effect::TestCode(TestCodeRequest {
            code: code.to_string(),
            session_id: session.id.clone(),
        })]
    }

    fn on_tests_completed(&mut self, outcome: Result<TestCodeOutcome, String>) -> Vec<Effect> {
        if self.screen != Screen::InCoding {
            return vec![];
        }
        match outcome {
            Ok(outcome) => vec![Effect::ShowTestReport(outcome)],
            Err(message) => vec![Effect::Alert(format!("Network Error: {message}"))],
        }
    }

    fn on_submit_requested(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if self.screen != Screen::InCoding {
            return vec![];
        }
        self.dispatch_submission(now, SubmitTrigger::Manual)
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let Some(deadline) = self.deadline else {
            return vec![];
        };
        if self.guard != SubmitGuard::NotSubmitted {
            return vec![];
        }
        if !deadline.is_expired(now) {
            return vec![Effect::RenderCountdown(deadline.remaining(now))];
        }
        let mut effects = vec![Effect::RenderCountdown(Duration::ZERO)];
        effects.extend(self.dispatch_submission(now, SubmitTrigger::DeadlineExpired));
        effects
    }

    /// Build and dispatch the one submission this session gets.
    fn dispatch_submission(&mut self, now: DateTime<Utc>, trigger: SubmitTrigger) -> Vec<Effect> {
        if self.guard != SubmitGuard::NotSubmitted {
            debug!(?trigger, "submission already dispatched");
            return vec![];
        }
        let Some(session) = &self.session else {
            return vec![];
        };

        let total_time_seconds = (now - session.started_at).num_seconds().max(0) as u64;
        let payload = SubmissionPayload {
            session_id: session.id.clone(),
            answers: self.answers.to_answers(&self.questions),
            code: self.code.clone(),
            total_time_seconds: Some(total_time_seconds),
        };
        info!(
            ?trigger,
            answers = payload.answers.len(),
            total_time_seconds,
            "submitting"
        );

        self.guard = SubmitGuard::Submitting;
        self.screen = Screen::Submitted;
        self.advancing = false;
        self.payload = Some(payload.clone());

        vec![
            Effect::StopTicker,
            Effect::CancelAdvance,
            Effect::Submit(payload),
        ]
    }

    fn on_submit_completed(&mut self, result: Result<SubmitResult, String>) -> Vec<Effect> {
        if self.guard != SubmitGuard::Submitting {
            return vec![];
        }
        self.guard = SubmitGuard::Submitted;

        match result {
            Ok(result) => {
                let mut effects = vec![Effect::ShowResult(result.clone())];
                if self.options.record_results {
                    effects.push(Effect::RecordResult(ResultRecord {
                        name: self.candidate_name.clone().unwrap_or_default(),
                        responses: self
                            .payload
                            .as_ref()
                            .map(|p| p.answers.clone())
                            .unwrap_or_default(),
                        score: result.score_mcq,
                    }));
                }
                self.result = Some(result);
                effects
            }
            Err(message) => {
                warn!(%message, "submission failed");
                self.submit_error = Some(message.clone());
                vec![Effect::Alert(format!("Error submitting the test: {message}"))]
            }
        }
    }
}
