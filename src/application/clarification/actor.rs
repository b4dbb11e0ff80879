//! Session actor - the single owner of a [`ClarificationSession`].
//!
//! Commands from any number of [`SessionHandle`]s and completions from the
//! actor's own background tasks arrive through one `mpsc` mailbox and are
//! applied one at a time. Background tasks (generator calls, fade timers)
//! never touch session state; they post a [`Completion`] and exit.
//!
//! After every applied message the actor publishes a [`SessionSnapshot`] on a
//! `watch` channel. For commands the snapshot is published before the reply is
//! sent, so a caller that awaited a command always observes its effect.
//!
//! ```text
//! SessionHandle ──Command──▶ ┌────────────┐ ──snapshot──▶ watch
//!                            │ SessionActor│
//! JoinSet task ─Completion─▶ └────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::clarification::{
    AssumptionItem, Question, RequirementContext, SessionState, SmartAction, StatusMessage,
};
use crate::domain::foundation::QuestionId;
use crate::ports::{ConnectivityMonitor, GenerationError, KeyValueStore, TextGenerator};

use super::busy::{BusyGuard, LlmBusyFlag};
use super::error::SessionError;
use super::orchestrator::{GenerationKind, GenerationOrchestrator};
use super::session::{ClarificationSession, SessionSettings};
use super::store::SessionStore;

const MAILBOX_CAPACITY: usize = 64;

/// Presentation pacing injected into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Delay between a question starting to fade and its removal.
    pub fade_out: Duration,
}

impl PacingPolicy {
    pub fn new(fade_out: Duration) -> Self {
        Self { fade_out }
    }

    /// No fade delay.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

/// Collaborators a session needs.
#[derive(Clone)]
pub struct SessionDeps {
    pub generator: Arc<dyn TextGenerator>,
    pub store: Arc<dyn KeyValueStore>,
    pub connectivity: Arc<dyn ConnectivityMonitor>,
    pub busy: LlmBusyFlag,
    pub pacing: PacingPolicy,
    pub settings: SessionSettings,
}

/// What the smart action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDispatch {
    RequestedBatch,
    Submitted(usize),
    GeneratingTestCases,
    /// An operation is already running.
    Ignored,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub action_label: &'static str,
    pub action_enabled: bool,
    pub questions: Vec<Question>,
    pub flat: Vec<String>,
    pub assumptions: Vec<AssumptionItem>,
    pub status: Option<StatusMessage>,
    pub running: Option<GenerationKind>,
    pub pending_replacements: usize,
    pub busy: bool,
    pub reachable: bool,
    /// No generator call, fade or dispatchable replacement is outstanding.
    pub settled: bool,
    pub test_cases: Option<String>,
}

impl SessionSnapshot {
    /// Questions still waiting for the user.
    pub fn active_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.is_active())
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    TriggerAction(Reply<ActionDispatch>),
    AskQuestions(Reply<()>),
    Answer(QuestionId, String, Reply<()>),
    MarkAsAssumption(QuestionId, Reply<()>),
    Skip(QuestionId, Reply<()>),
    Remove(QuestionId, Reply<()>),
    EditText(QuestionId, String, Reply<()>),
    ImportText(String, Reply<usize>),
    SubmitAnswers(Reply<usize>),
    GenerateTestCases(Reply<()>),
    ResetAssumptions(Reply<usize>),
    SetAssumptionEnabled(String, bool, Reply<()>),
    CancelGeneration(Reply<()>),
}

enum Completion {
    Generated(GenerationKind, Result<String, GenerationError>),
    FadeElapsed(QuestionId),
}

enum Envelope {
    Command(Command),
    Completion(Completion),
}

/// Cloneable client of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<SessionSnapshot>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Restores persisted state and starts the actor on the current runtime.
    pub fn spawn(requirement: RequirementContext, deps: SessionDeps) -> Self {
        let (commands, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let shutdown = CancellationToken::new();

        let store = SessionStore::new(Arc::clone(&deps.store), requirement.id.clone());
        let orchestrator =
            GenerationOrchestrator::new(Arc::clone(&deps.generator), deps.settings.question_budget);
        let mut session =
            ClarificationSession::new(requirement, orchestrator.clone(), store, deps.settings);
        session.restore();

        let generation = shutdown.child_token();
        let mut actor = SessionActor {
            session,
            orchestrator,
            connectivity: deps.connectivity,
            busy: deps.busy,
            pacing: deps.pacing,
            mailbox: commands.downgrade(),
            tasks: JoinSet::new(),
            root: shutdown.clone(),
            generation,
            snapshots: None,
        };
        let (tx, snapshots) = watch::channel(actor.snapshot());
        actor.snapshots = Some(tx);

        tracing::info!(
            requirement = ?actor.session.requirement().id,
            state = %actor.session.state(),
            "Clarification session started"
        );
        tokio::spawn(actor.run(mailbox));

        Self {
            commands,
            snapshots,
            shutdown,
        }
    }

    /// Runs the action for the current state (ask, submit or generate).
    pub async fn trigger_action(&self) -> Result<ActionDispatch, SessionError> {
        self.request(Command::TriggerAction).await
    }

    /// Requests a fresh batch, replacing the current questions.
    pub async fn ask_questions(&self) -> Result<(), SessionError> {
        self.request(Command::AskQuestions).await
    }

    pub async fn answer(&self, id: QuestionId, answer: impl Into<String>) -> Result<(), SessionError> {
        let answer = answer.into();
        self.request(|reply| Command::Answer(id, answer, reply)).await
    }

    pub async fn mark_as_assumption(&self, id: QuestionId) -> Result<(), SessionError> {
        self.request(|reply| Command::MarkAsAssumption(id, reply)).await
    }

    pub async fn skip(&self, id: QuestionId) -> Result<(), SessionError> {
        self.request(|reply| Command::Skip(id, reply)).await
    }

    pub async fn remove(&self, id: QuestionId) -> Result<(), SessionError> {
        self.request(|reply| Command::Remove(id, reply)).await
    }

    pub async fn edit_text(&self, id: QuestionId, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.request(|reply| Command::EditText(id, text, reply)).await
    }

    /// Replaces the questions with ones parsed from pasted text.
    pub async fn import_text(&self, text: impl Into<String>) -> Result<usize, SessionError> {
        let text = text.into();
        self.request(|reply| Command::ImportText(text, reply)).await
    }

    pub async fn submit_answers(&self) -> Result<usize, SessionError> {
        self.request(Command::SubmitAnswers).await
    }

    pub async fn generate_test_cases(&self) -> Result<(), SessionError> {
        self.request(Command::GenerateTestCases).await
    }

    pub async fn reset_assumptions(&self) -> Result<usize, SessionError> {
        self.request(Command::ResetAssumptions).await
    }

    pub async fn set_assumption_enabled(
        &self,
        key: impl Into<String>,
        enabled: bool,
    ) -> Result<(), SessionError> {
        let key = key.into();
        self.request(|reply| Command::SetAssumptionEnabled(key, enabled, reply)).await
    }

    /// Cancels in-flight generator calls and drops queued replacements.
    pub async fn cancel_generation(&self) -> Result<(), SessionError> {
        self.request(Command::CancelGeneration).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Waits until nothing is outstanding and returns that snapshot.
    pub async fn wait_until_settled(&self) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|snapshot| snapshot.settled)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Stops the actor and waits for its tasks to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut rx = self.snapshots.clone();
        while rx.changed().await.is_ok() {}
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope::Command(command(reply)))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }
}

struct SessionActor {
    session: ClarificationSession,
    orchestrator: GenerationOrchestrator,
    connectivity: Arc<dyn ConnectivityMonitor>,
    busy: LlmBusyFlag,
    pacing: PacingPolicy,
    mailbox: mpsc::WeakSender<Envelope>,
    tasks: JoinSet<()>,
    root: CancellationToken,
    /// Child of `root` observed by generator calls; replaced on cancel.
    generation: CancellationToken,
    snapshots: Option<watch::Sender<SessionSnapshot>>,
}

impl SessionActor {
    async fn run(mut self, mut mailbox: mpsc::Receiver<Envelope>) {
        let root = self.root.clone();
        let mut busy_rx = self.busy.subscribe();
        let mut reach_rx = self.connectivity.subscribe();
        let mut busy_open = true;
        let mut reach_open = true;

        self.settle();
        loop {
            let waiting = self.session.pending_replacements() > 0;
            tokio::select! {
                biased;
                _ = root.cancelled() => break,
                envelope = mailbox.recv() => match envelope {
                    Some(Envelope::Command(command)) => self.handle_command(command),
                    Some(Envelope::Completion(completion)) => self.handle_completion(completion),
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            tracing::error!(error = %err, "Session task panicked");
                        }
                    }
                }
                changed = busy_rx.changed(), if busy_open && waiting => {
                    if changed.is_err() {
                        busy_open = false;
                    }
                    self.settle();
                }
                changed = reach_rx.changed(), if reach_open => {
                    match changed {
                        Ok(()) => {
                            let reachable = *reach_rx.borrow_and_update();
                            tracing::info!(reachable, "Connectivity changed");
                        }
                        Err(_) => reach_open = false,
                    }
                    self.settle();
                }
            }
        }

        self.stop().await;
    }

    async fn stop(&mut self) {
        self.generation.cancel();
        self.session.abandon_in_flight();
        self.tasks.shutdown().await;
        self.publish();
        tracing::info!(state = %self.session.state(), "Clarification session stopped");
        self.snapshots = None;
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::TriggerAction(reply) => {
                let result = self.trigger_action();
                self.reply(reply, result);
            }
            Command::AskQuestions(reply) => {
                let result = self.start_batch();
                self.reply(reply, result);
            }
            Command::Answer(id, answer, reply) => {
                let result = self.session.answer(id, &answer).map(|fade| self.fade(fade));
                self.reply(reply, result);
            }
            Command::MarkAsAssumption(id, reply) => {
                let result = self.session.mark_as_assumption(id).map(|fade| self.fade(fade));
                self.reply(reply, result);
            }
            Command::Skip(id, reply) => {
                let result = self.session.skip(id);
                self.reply(reply, result);
            }
            Command::Remove(id, reply) => {
                let result = self.session.remove(id).map(|_| ());
                self.reply(reply, result);
            }
            Command::EditText(id, text, reply) => {
                let result = self.session.edit_text(id, &text);
                self.reply(reply, result);
            }
            Command::ImportText(text, reply) => {
                let result = self.session.import_text(&text);
                self.reply(reply, result);
            }
            Command::SubmitAnswers(reply) => {
                let submitted = self.session.submit_answers();
                self.reply(reply, Ok(submitted));
            }
            Command::GenerateTestCases(reply) => {
                let result = self.start_test_cases();
                self.reply(reply, result);
            }
            Command::ResetAssumptions(reply) => {
                let disabled = self.session.reset_assumptions();
                self.reply(reply, Ok(disabled));
            }
            Command::SetAssumptionEnabled(key, enabled, reply) => {
                let result = self.session.set_assumption_enabled(&key, enabled);
                self.reply(reply, result);
            }
            Command::CancelGeneration(reply) => {
                self.cancel_generation();
                self.reply(reply, Ok(()));
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Generated(GenerationKind::Batch, result) => {
                self.session.complete_batch(result)
            }
            Completion::Generated(GenerationKind::Replacement, result) => {
                self.session.complete_replacement(result)
            }
            Completion::Generated(GenerationKind::TestCases, result) => {
                self.session.complete_test_cases(result)
            }
            Completion::FadeElapsed(id) => {
                if !self.session.finish_fade(id) {
                    tracing::debug!(question_id = %id, "Fade elapsed for a question no longer fading");
                }
            }
        }
        self.settle();
    }

    /// Dispatches any due replacement, then publishes.
    fn settle(&mut self) {
        self.dispatch_replacement();
        self.publish();
    }

    fn reply<T>(&mut self, reply: Reply<T>, result: Result<T, SessionError>) {
        self.settle();
        if reply.send(result).is_err() {
            tracing::debug!("Command caller went away before the reply");
        }
    }

    fn trigger_action(&mut self) -> Result<ActionDispatch, SessionError> {
        match self.session.smart_action() {
            SmartAction::RequestBatch => self.start_batch().map(|_| ActionDispatch::RequestedBatch),
            SmartAction::SubmitAnswers => {
                if self.busy.is_busy() {
                    self.session
                        .set_status(StatusMessage::warning(SessionError::Busy.to_string()));
                    return Err(SessionError::Busy);
                }
                Ok(ActionDispatch::Submitted(self.session.submit_answers()))
            }
            SmartAction::GenerateTestCases => self
                .start_test_cases()
                .map(|_| ActionDispatch::GeneratingTestCases),
            SmartAction::NoOp => Ok(ActionDispatch::Ignored),
        }
    }

    fn start_batch(&mut self) -> Result<(), SessionError> {
        self.session.check_preconditions()?;
        let guard = self.claim_generator()?;
        let prompt = self.session.prepare_batch()?;
        self.session.begin_batch();
        self.spawn_generation(GenerationKind::Batch, prompt, guard);
        Ok(())
    }

    fn start_test_cases(&mut self) -> Result<(), SessionError> {
        self.session.check_preconditions()?;
        let guard = self.claim_generator()?;
        let prompt = self.session.prepare_test_cases()?;
        self.session.begin_test_cases();
        self.spawn_generation(GenerationKind::TestCases, prompt, guard);
        Ok(())
    }

    /// Connectivity, then the shared busy flag.
    fn claim_generator(&mut self) -> Result<BusyGuard, SessionError> {
        if self.session.is_running() {
            return Err(SessionError::ActionUnavailable(SessionState::Generating));
        }
        if !self.connectivity.is_reachable() {
            self.session
                .set_status(StatusMessage::warning(SessionError::Unreachable.to_string()));
            return Err(SessionError::Unreachable);
        }
        self.busy.try_acquire().ok_or_else(|| {
            self.session
                .set_status(StatusMessage::warning(SessionError::Busy.to_string()));
            SessionError::Busy
        })
    }

    fn dispatch_replacement(&mut self) {
        if !self.session.can_dispatch_replacement() || !self.connectivity.is_reachable() {
            return;
        }
        let Some(guard) = self.busy.try_acquire() else {
            tracing::debug!(
                pending = self.session.pending_replacements(),
                "Replacement waiting for the generator"
            );
            return;
        };
        match self.session.next_replacement() {
            Some(Ok(prompt)) => self.spawn_generation(GenerationKind::Replacement, prompt, guard),
            Some(Err(err)) => tracing::warn!(error = %err, "Replacement request not sent"),
            None => {}
        }
    }

    fn spawn_generation(&mut self, kind: GenerationKind, prompt: String, guard: BusyGuard) {
        let call = self
            .orchestrator
            .execute(kind, prompt, self.generation.child_token());
        let mailbox = self.mailbox.clone();
        self.tasks.spawn(async move {
            let result = call.await;
            drop(guard);
            post(&mailbox, Completion::Generated(kind, result)).await;
        });
    }

    fn fade(&mut self, fading: Option<QuestionId>) {
        let Some(id) = fading else {
            return;
        };
        let delay = self.pacing.fade_out;
        let cancel = self.root.child_token();
        let mailbox = self.mailbox.clone();
        tracing::debug!(question_id = %id, delay_ms = delay.as_millis() as u64, "Question fading out");
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => post(&mailbox, Completion::FadeElapsed(id)).await,
            }
        });
    }

    fn cancel_generation(&mut self) {
        self.generation.cancel();
        self.generation = self.root.child_token();
        let dropped = self.session.clear_replacement_queue();
        tracing::info!(dropped_replacements = dropped, "Generation cancelled");
    }

    fn snapshot(&self) -> SessionSnapshot {
        let session = &self.session;
        let state = session.state();
        let busy = self.busy.is_busy();
        let reachable = self.connectivity.is_reachable();
        let availability = state.availability(busy, reachable);
        let settled =
            session.is_quiescent() && (session.pending_replacements() == 0 || !reachable);

        SessionSnapshot {
            state,
            action_label: availability.label,
            action_enabled: availability.enabled,
            questions: session.questions().to_vec(),
            flat: session.flat_questions().to_vec(),
            assumptions: session.catalog().items().to_vec(),
            status: session.status().cloned(),
            running: session.running_kind(),
            pending_replacements: session.pending_replacements(),
            busy,
            reachable,
            settled,
            test_cases: session.test_cases().map(str::to_string),
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.snapshots {
            tx.send_replace(self.snapshot());
        }
    }
}

async fn post(mailbox: &mpsc::WeakSender<Envelope>, completion: Completion) {
    if let Some(tx) = mailbox.upgrade() {
        if tx.send(Envelope::Completion(completion)).await.is_err() {
            tracing::debug!("Session closed before completion was delivered");
        }
    }
}
