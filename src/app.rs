use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::ai::{AiGateway, GatewayConfig, GeminiClient};
use crate::config::Config;
use crate::credentials::{validate_api_key, CredentialStore, MIN_API_KEY_LEN};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{
    derive_title, random_sample, step_length_percent, validate_article_text,
    ArticleHistoryRecord, AuthenticityAssessment, NewArticleHistory, Profile, QuizAttempt,
    QuizFeedback, QuizQuestion, ReferenceList, SummaryRequest,
};
use crate::services::ContentFetcher;
use crate::tui::{AppAction, KeyContext};

const NOTIFICATION_TTL: Duration = Duration::from_secs(4);
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MIN_QUESTION_CHARS: usize = 5;
const SAMPLE_LENGTH_PERCENT: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingCredential,
    Composing,
    Summarizing,
    Summarized,
    TakingQuiz,
    QuizScored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Wizard,
    History,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Text,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTab {
    Summary,
    Answer,
    Authenticity,
    Translation,
    References,
}

impl ResultTab {
    pub const ALL: [ResultTab; 5] = [
        ResultTab::Summary,
        ResultTab::Answer,
        ResultTab::Authenticity,
        ResultTab::Translation,
        ResultTab::References,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResultTab::Summary => "Summary",
            ResultTab::Answer => "Q&A",
            ResultTab::Authenticity => "Authenticity",
            ResultTab::Translation => "Translation",
            ResultTab::References => "References",
        }
    }

    fn shift(self, forward: bool) -> Self {
        let len = Self::ALL.len();
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
        Self::ALL[next]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Question,
    Language,
}

#[derive(Debug, Clone)]
pub struct LinePrompt {
    pub kind: PromptKind,
    pub buffer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    created: Instant,
}

/// The article currently on screen
#[derive(Debug, Clone)]
pub struct CurrentArticle {
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub history_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct QuizState {
    pub questions: Vec<QuizQuestion>,
    pub attempt: QuizAttempt,
    pub cursor: usize,
    pub result: Option<QuizFeedback>,
}

/// Kinds of background work; each has its own generation counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Summary,
    Answer,
    Authenticity,
    Translation,
    References,
    Quiz,
    Feedback,
}

/// Hands out a fresh token per request so a late reply to an older request
/// of the same kind can be recognised and dropped.
#[derive(Debug, Default)]
pub struct RequestTokens {
    current: HashMap<OpKind, u64>,
    next: u64,
}

impl RequestTokens {
    pub fn issue(&mut self, kind: OpKind) -> u64 {
        self.next += 1;
        self.current.insert(kind, self.next);
        self.next
    }

    pub fn is_current(&self, kind: OpKind, token: u64) -> bool {
        self.current.get(&kind) == Some(&token)
    }

    pub fn invalidate_all(&mut self) {
        self.current.clear();
    }
}

pub enum TaskOutput {
    Summary {
        title: String,
        original_text: String,
        summary: String,
    },
    Answer {
        question: String,
        answer: String,
    },
    Authenticity(AuthenticityAssessment),
    Translation {
        language: String,
        text: String,
    },
    References(ReferenceList),
    Quiz(Vec<QuizQuestion>),
    Feedback(QuizFeedback),
}

pub struct TaskMessage {
    pub kind: OpKind,
    pub token: u64,
    pub result: Result<TaskOutput>,
}

pub struct App {
    // Wizard state
    pub stage: Stage,
    pub view: View,
    pub show_help: bool,
    return_stage: Option<Stage>,

    // Inputs
    pub key_input: String,
    pub input_mode: InputMode,
    pub article_input: String,
    pub url_input: String,
    pub length_percent: u8,
    pub prompt: Option<LinePrompt>,

    // Results for the current article
    pub article: Option<CurrentArticle>,
    pub result_tab: ResultTab,
    pub answer: Option<(String, String)>,
    pub authenticity: Option<AuthenticityAssessment>,
    pub translation: Option<(String, String)>,
    pub references: Option<ReferenceList>,
    pub selected_reference: usize,
    pub quiz: Option<QuizState>,

    // History and profile
    pub history: Vec<ArticleHistoryRecord>,
    pub history_index: usize,
    pub profile: Profile,

    // Async state
    pub notification: Option<Notification>,
    pub busy: HashSet<OpKind>,
    spinner_frame: usize,
    tokens: RequestTokens,
    task_rx: mpsc::Receiver<TaskMessage>,
    task_tx: mpsc::Sender<TaskMessage>,

    // Services
    gateway: AiGateway,
    credentials: CredentialStore,
    pub repository: Repository,
    fetcher: Arc<ContentFetcher>,
    save_history: bool,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let mut credentials = CredentialStore::open(&config.credentials_path);
        let gateway_config = GatewayConfig::from(config);
        let backend = Arc::new(GeminiClient::new(&gateway_config)?);
        let gateway = AiGateway::new(backend, credentials.get()?);
        let fetcher = ContentFetcher::new(gateway_config.timeout)?;

        Self::with_services(config, gateway, credentials, repository, fetcher).await
    }

    pub async fn with_services(
        config: &Config,
        gateway: AiGateway,
        credentials: CredentialStore,
        repository: Repository,
        fetcher: ContentFetcher,
    ) -> Result<Self> {
        let profile = repository.ensure_profile(config.profile_name.clone()).await?;
        let (task_tx, task_rx) = mpsc::channel(16);

        let stage = if gateway.has_credential() {
            Stage::Composing
        } else {
            Stage::AwaitingCredential
        };

        Ok(Self {
            stage,
            view: View::Wizard,
            show_help: false,
            return_stage: None,
            key_input: String::new(),
            input_mode: InputMode::Text,
            article_input: String::new(),
            url_input: String::new(),
            length_percent: config.default_length_percent,
            prompt: None,
            article: None,
            result_tab: ResultTab::Summary,
            answer: None,
            authenticity: None,
            translation: None,
            references: None,
            selected_reference: 0,
            quiz: None,
            history: Vec::new(),
            history_index: 0,
            profile,
            notification: None,
            busy: HashSet::new(),
            spinner_frame: 0,
            tokens: RequestTokens::default(),
            task_rx,
            task_tx,
            gateway,
            credentials,
            repository,
            fetcher: Arc::new(fetcher),
            save_history: config.save_history,
        })
    }

    pub fn key_context(&self) -> KeyContext {
        if self.show_help {
            return KeyContext::Help;
        }
        match self.view {
            View::History => return KeyContext::History,
            View::Profile => return KeyContext::Profile,
            View::Wizard => {}
        }
        if self.prompt.is_some() {
            return KeyContext::LinePrompt;
        }
        match self.stage {
            Stage::AwaitingCredential => KeyContext::CredentialModal,
            Stage::Composing => match self.input_mode {
                InputMode::Text => KeyContext::ComposingText,
                InputMode::Url => KeyContext::ComposingUrl,
            },
            Stage::Summarizing => KeyContext::Summarizing,
            Stage::Summarized => KeyContext::Summarized,
            Stage::TakingQuiz => KeyContext::TakingQuiz,
            Stage::QuizScored => KeyContext::QuizScored,
        }
    }

    pub fn is_busy(&self, kind: OpKind) -> bool {
        self.busy.contains(&kind)
    }

    pub fn model_version(&self) -> &str {
        self.gateway.model_version()
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    pub fn tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        if self
            .notification
            .as_ref()
            .is_some_and(|n| n.created.elapsed() >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
    }

    pub fn selected_history(&self) -> Option<&ArticleHistoryRecord> {
        self.history.get(self.history_index)
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notification = Some(Notification {
            message: message.into(),
            level,
            created: Instant::now(),
        });
    }

    pub async fn handle_action(&mut self, action: AppAction) -> bool {
        match action {
            AppAction::Quit => return true,

            AppAction::ShowHelp => self.show_help = true,
            AppAction::HideHelp => self.show_help = false,

            AppAction::ShowHistory => {
                self.reload_history().await;
                self.view = View::History;
            }

            AppAction::ShowProfile => {
                self.reload_history().await;
                self.view = View::Profile;
            }

            AppAction::ShowWizard => self.view = View::Wizard,

            AppAction::OpenCredentialModal => {
                self.view = View::Wizard;
                self.open_credential_modal();
            }

            AppAction::InputChar(c) => {
                if let Some(buffer) = self.active_buffer() {
                    buffer.push(c);
                }
            }

            AppAction::InputNewline => {
                if self.key_context() == KeyContext::ComposingText {
                    self.article_input.push('\n');
                }
            }

            AppAction::InputBackspace => {
                if let Some(buffer) = self.active_buffer() {
                    buffer.pop();
                }
            }

            AppAction::Paste(text) => {
                let multiline = self.key_context() == KeyContext::ComposingText;
                if let Some(buffer) = self.active_buffer() {
                    if multiline {
                        buffer.push_str(&text.replace("\r\n", "\n"));
                    } else {
                        buffer.extend(text.chars().filter(|c| !c.is_control()));
                    }
                }
            }

            AppAction::ConfirmInput => match self.key_context() {
                KeyContext::CredentialModal => self.save_credential(),
                KeyContext::LinePrompt => self.confirm_prompt(),
                _ => {}
            },

            AppAction::CancelInput => match self.key_context() {
                KeyContext::CredentialModal => {
                    self.key_input.clear();
                    self.stage = self.return_stage.take().unwrap_or(Stage::Composing);
                }
                KeyContext::LinePrompt => self.prompt = None,
                KeyContext::TakingQuiz => {
                    self.cancel(OpKind::Feedback);
                    self.quiz = None;
                    self.stage = Stage::Summarized;
                }
                KeyContext::QuizScored => self.stage = Stage::Summarized,
                _ => {}
            },

            AppAction::ToggleInputMode => {
                self.input_mode = match self.input_mode {
                    InputMode::Text => InputMode::Url,
                    InputMode::Url => InputMode::Text,
                };
            }

            AppAction::LengthUp => {
                self.length_percent = step_length_percent(self.length_percent, true);
            }

            AppAction::LengthDown => {
                self.length_percent = step_length_percent(self.length_percent, false);
            }

            AppAction::Submit => self.submit_article(),

            AppAction::LoadSample => {
                let sample = random_sample();
                self.input_mode = InputMode::Text;
                self.article_input = sample.text.to_string();
                self.length_percent = SAMPLE_LENGTH_PERCENT;
                self.submit_article();
                if self.stage == Stage::Summarizing {
                    self.notify(
                        NotificationLevel::Info,
                        format!("Loaded sample: {}", sample.title),
                    );
                }
            }

            AppAction::NextTab => self.result_tab = self.result_tab.shift(true),
            AppAction::PrevTab => self.result_tab = self.result_tab.shift(false),

            AppAction::AskQuestion => self.open_prompt(PromptKind::Question),
            AppAction::Translate => self.open_prompt(PromptKind::Language),

            AppAction::AnalyzeAuthenticity => {
                if let Some(article) = &self.article {
                    let gateway = self.gateway.clone();
                    let text = article.original_text.clone();
                    self.result_tab = ResultTab::Authenticity;
                    self.spawn_task(OpKind::Authenticity, async move {
                        let assessment = gateway.analyze_authenticity(&text).await?;
                        Ok(TaskOutput::Authenticity(assessment))
                    });
                }
            }

            AppAction::FindReferences => {
                if let Some(article) = &self.article {
                    let gateway = self.gateway.clone();
                    let topic = article.summary.clone();
                    self.result_tab = ResultTab::References;
                    self.spawn_task(OpKind::References, async move {
                        let list = gateway.generate_references(&topic).await?;
                        Ok(TaskOutput::References(list))
                    });
                }
            }

            AppAction::OpenReference => {
                if self.result_tab == ResultTab::References {
                    if let Some(reference) = self
                        .references
                        .as_ref()
                        .and_then(|r| r.references.get(self.selected_reference))
                    {
                        if let Err(e) = open::that(&reference.url) {
                            tracing::warn!("Failed to open {}: {}", reference.url, e);
                        }
                    }
                }
            }

            AppAction::StartQuiz => {
                if let Some(article) = &self.article {
                    let gateway = self.gateway.clone();
                    let summary = article.summary.clone();
                    self.spawn_task(OpKind::Quiz, async move {
                        let questions = gateway.generate_quiz_questions(&summary).await?;
                        Ok(TaskOutput::Quiz(questions))
                    });
                    self.notify(NotificationLevel::Info, "Generating quiz...");
                }
            }

            AppAction::NewArticle => self.reset_article(),

            AppAction::MoveUp => self.move_selection(false),
            AppAction::MoveDown => self.move_selection(true),

            // Answers are frozen once the quiz has been handed in
            AppAction::SelectOption(_) | AppAction::SubmitQuiz
                if self.is_busy(OpKind::Feedback) => {}

            AppAction::SelectOption(option) => {
                if let Some(quiz) = &mut self.quiz {
                    quiz.attempt.select(quiz.cursor, option as i8);
                    if quiz.cursor + 1 < quiz.questions.len() {
                        quiz.cursor += 1;
                    }
                }
            }

            AppAction::SubmitQuiz => self.submit_quiz(),

            AppAction::OpenHistoryEntry => {
                if let Some(record) = self.selected_history().cloned() {
                    self.reset_article();
                    self.article = Some(CurrentArticle {
                        title: record.title,
                        original_text: record.original_text,
                        summary: record.summary,
                        history_id: Some(record.id),
                    });
                    self.stage = Stage::Summarized;
                    self.view = View::Wizard;
                }
            }

            AppAction::DeleteHistoryEntry => {
                if let Some(id) = self.selected_history().map(|h| h.id) {
                    if let Err(e) = self.repository.delete_article(id).await {
                        self.storage_failed("delete history entry", e);
                        return false;
                    }
                    if let Some(article) = &mut self.article {
                        if article.history_id == Some(id) {
                            article.history_id = None;
                        }
                    }
                    if self.reload_history().await {
                        self.notify(NotificationLevel::Info, "Deleted from history");
                    }
                }
            }
        }

        false
    }

    fn active_buffer(&mut self) -> Option<&mut String> {
        match self.key_context() {
            KeyContext::CredentialModal => Some(&mut self.key_input),
            KeyContext::LinePrompt => self.prompt.as_mut().map(|p| &mut p.buffer),
            KeyContext::ComposingText => Some(&mut self.article_input),
            KeyContext::ComposingUrl => Some(&mut self.url_input),
            _ => None,
        }
    }

    fn open_credential_modal(&mut self) {
        if self.stage != Stage::AwaitingCredential {
            self.return_stage = Some(self.stage);
            self.stage = Stage::AwaitingCredential;
        }
        self.prompt = None;
        self.key_input.clear();
    }

    fn save_credential(&mut self) {
        let Some(key) = validate_api_key(&self.key_input).map(str::to_string) else {
            self.notify(
                NotificationLevel::Error,
                format!("API key must be at least {} characters", MIN_API_KEY_LEN),
            );
            return;
        };

        match self.credentials.set(&key) {
            Ok(()) => {
                self.gateway = self.gateway.with_api_key(Some(key));
                self.key_input.clear();
                self.stage = self.return_stage.take().unwrap_or(Stage::Composing);
                self.notify(NotificationLevel::Success, "API key saved successfully");
            }
            Err(e) => {
                tracing::error!("Failed to store API key: {}", e);
                self.notify(NotificationLevel::Error, format!("Could not save API key: {}", e));
            }
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        if self.article.is_some() {
            self.prompt = Some(LinePrompt {
                kind,
                buffer: String::new(),
            });
        }
    }

    fn confirm_prompt(&mut self) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let Some((original_text, summary)) = self
            .article
            .as_ref()
            .map(|a| (a.original_text.clone(), a.summary.clone()))
        else {
            return;
        };
        let input = prompt.buffer.trim().to_string();
        let gateway = self.gateway.clone();

        match prompt.kind {
            PromptKind::Question => {
                if input.chars().count() < MIN_QUESTION_CHARS {
                    self.notify(NotificationLevel::Error, "Please enter a valid question");
                    return;
                }
                self.result_tab = ResultTab::Answer;
                self.spawn_task(OpKind::Answer, async move {
                    let answer = gateway.answer_question(&original_text, &input).await?;
                    Ok(TaskOutput::Answer {
                        question: input,
                        answer,
                    })
                });
            }
            PromptKind::Language => {
                if input.is_empty() {
                    self.notify(NotificationLevel::Error, "Please enter a language code");
                    return;
                }
                self.result_tab = ResultTab::Translation;
                self.spawn_task(OpKind::Translation, async move {
                    let text = gateway.translate(&summary, &input).await?;
                    Ok(TaskOutput::Translation {
                        language: input,
                        text,
                    })
                });
            }
        }
    }

    fn submit_article(&mut self) {
        if !self.gateway.has_credential() {
            self.open_credential_modal();
            self.notify(NotificationLevel::Error, AppError::CredentialMissing.to_string());
            return;
        }

        let gateway = self.gateway.clone();
        let percent = self.length_percent;

        match self.input_mode {
            InputMode::Text => {
                let request = match validate_article_text(&self.article_input)
                    .and_then(|text| SummaryRequest::new(text, percent))
                {
                    Ok(request) => request,
                    Err(e) => {
                        self.notify(NotificationLevel::Error, e.to_string());
                        return;
                    }
                };
                self.spawn_task(OpKind::Summary, async move {
                    let summary = gateway.summarize(&request).await?;
                    Ok(TaskOutput::Summary {
                        title: derive_title(None, &request.source_text),
                        original_text: request.source_text,
                        summary,
                    })
                });
            }
            InputMode::Url => {
                let url = self.url_input.trim().to_string();
                if url.is_empty() {
                    self.notify(NotificationLevel::Error, "Please enter a URL");
                    return;
                }
                let fetcher = Arc::clone(&self.fetcher);
                self.spawn_task(OpKind::Summary, async move {
                    let fetched = fetcher.fetch_article(&url).await?;
                    let request = SummaryRequest::new(fetched.text, percent)?;
                    let summary = gateway.summarize(&request).await?;
                    Ok(TaskOutput::Summary {
                        title: derive_title(fetched.title.as_deref(), &request.source_text),
                        original_text: request.source_text,
                        summary,
                    })
                });
            }
        }

        self.stage = Stage::Summarizing;
    }

    fn submit_quiz(&mut self) {
        let Some(quiz) = &self.quiz else {
            return;
        };
        if !quiz.attempt.is_complete() {
            self.notify(NotificationLevel::Error, "Please answer all questions");
            return;
        }
        let summary = self
            .article
            .as_ref()
            .map(|a| a.summary.clone())
            .unwrap_or_default();
        let questions = quiz.questions.clone();
        let selected = quiz.attempt.selected.clone();
        let gateway = self.gateway.clone();

        self.spawn_task(OpKind::Feedback, async move {
            let feedback = gateway
                .generate_quiz_feedback(&summary, &questions, &selected)
                .await;
            Ok(TaskOutput::Feedback(feedback))
        });
    }

    fn move_selection(&mut self, down: bool) {
        fn step(index: &mut usize, len: usize, down: bool) {
            if len == 0 {
                return;
            }
            if down && *index + 1 < len {
                *index += 1;
            } else if !down && *index > 0 {
                *index -= 1;
            }
        }

        match self.key_context() {
            KeyContext::History => step(&mut self.history_index, self.history.len(), down),
            KeyContext::TakingQuiz => {
                if let Some(quiz) = &mut self.quiz {
                    step(&mut quiz.cursor, quiz.questions.len(), down);
                }
            }
            KeyContext::Summarized => {
                let len = self.references.as_ref().map_or(0, |r| r.references.len());
                step(&mut self.selected_reference, len, down);
            }
            _ => {}
        }
    }

    fn reset_article(&mut self) {
        self.tokens.invalidate_all();
        self.busy.clear();
        self.article = None;
        self.answer = None;
        self.authenticity = None;
        self.translation = None;
        self.references = None;
        self.selected_reference = 0;
        self.quiz = None;
        self.prompt = None;
        self.result_tab = ResultTab::Summary;
        self.stage = if self.gateway.has_credential() {
            Stage::Composing
        } else {
            Stage::AwaitingCredential
        };
    }

    /// Orphan whatever request of this kind is in flight
    fn cancel(&mut self, kind: OpKind) {
        self.tokens.issue(kind);
        self.busy.remove(&kind);
    }

    /// Refresh the history list; on failure the previous list stays on screen
    async fn reload_history(&mut self) -> bool {
        match self.repository.get_history(self.profile.id).await {
            Ok(history) => {
                self.history = history;
                if self.history_index >= self.history.len() {
                    self.history_index = self.history.len().saturating_sub(1);
                }
                true
            }
            Err(e) => {
                self.storage_failed("load history", e);
                false
            }
        }
    }

    fn storage_failed(&mut self, what: &str, e: AppError) {
        tracing::error!("Failed to {}: {}", what, e);
        self.notify(NotificationLevel::Error, format!("Could not {}: {}", what, e));
    }

    /// The stage underneath the key modal, if it is open
    fn underlying_stage(&self) -> Stage {
        match self.stage {
            Stage::AwaitingCredential => self.return_stage.unwrap_or(Stage::Composing),
            stage => stage,
        }
    }

    /// Move to `stage` without closing the key modal if it is open
    fn settle(&mut self, stage: Stage) {
        if self.stage == Stage::AwaitingCredential {
            self.return_stage = Some(stage);
        } else {
            self.stage = stage;
        }
    }

    fn spawn_task<F>(&mut self, kind: OpKind, task: F)
    where
        F: Future<Output = Result<TaskOutput>> + Send + 'static,
    {
        let token = self.tokens.issue(kind);
        self.busy.insert(kind);
        let tx = self.task_tx.clone();

        tokio::spawn(async move {
            let result = task.await;
            let _ = tx.send(TaskMessage { kind, token, result }).await;
        });
    }

    /// Apply every finished background task (non-blocking)
    pub async fn poll_tasks(&mut self) {
        while let Ok(message) = self.task_rx.try_recv() {
            self.apply_task(message).await;
        }
    }

    pub async fn apply_task(&mut self, message: TaskMessage) {
        let TaskMessage { kind, token, result } = message;
        if !self.tokens.is_current(kind, token) {
            tracing::debug!("Discarding stale {:?} result", kind);
            return;
        }
        self.busy.remove(&kind);

        match result {
            Ok(output) => self.apply_output(output).await,
            Err(e) => {
                tracing::error!("{:?} request failed: {}", kind, e);
                if kind == OpKind::Summary {
                    self.settle(Stage::Composing);
                }
                if matches!(e, AppError::CredentialMissing) {
                    self.open_credential_modal();
                }
                self.notify(NotificationLevel::Error, e.to_string());
            }
        }
    }

    async fn apply_output(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::Summary {
                title,
                original_text,
                summary,
            } => {
                let history_id = if self.save_history {
                    let saved = self
                        .repository
                        .save_article(NewArticleHistory {
                            user_id: self.profile.id,
                            title: title.clone(),
                            original_text: original_text.clone(),
                            summary: summary.clone(),
                        })
                        .await;
                    match saved {
                        Ok(id) => Some(id),
                        Err(e) => {
                            self.storage_failed("save to history", e);
                            None
                        }
                    }
                } else {
                    None
                };

                self.article = Some(CurrentArticle {
                    title,
                    original_text,
                    summary,
                    history_id,
                });
                self.answer = None;
                self.authenticity = None;
                self.translation = None;
                self.references = None;
                self.quiz = None;
                self.result_tab = ResultTab::Summary;
                self.settle(Stage::Summarized);
            }

            TaskOutput::Answer { question, answer } => {
                self.answer = Some((question, answer));
            }

            TaskOutput::Authenticity(assessment) => {
                self.authenticity = Some(assessment);
            }

            TaskOutput::Translation { language, text } => {
                self.translation = Some((language, text));
            }

            TaskOutput::References(list) => {
                if let Some(error) = &list.parse_error {
                    self.notify(
                        NotificationLevel::Error,
                        format!("Could not read references: {}", error),
                    );
                }
                self.selected_reference = 0;
                self.references = Some(list);
            }

            TaskOutput::Quiz(questions) => {
                if self.underlying_stage() == Stage::Summarized {
                    let count = questions.len();
                    self.quiz = Some(QuizState {
                        questions,
                        attempt: QuizAttempt::new(count),
                        cursor: 0,
                        result: None,
                    });
                    self.settle(Stage::TakingQuiz);
                    self.notification = None;
                }
            }

            TaskOutput::Feedback(feedback) => {
                let score = feedback.score_percent;
                if let Some(quiz) = &mut self.quiz {
                    quiz.result = Some(feedback.clone());
                }
                self.settle(Stage::QuizScored);
                self.notify(
                    NotificationLevel::Success,
                    format!("Quiz completed! You scored {}/100", score),
                );

                if let Some(history_id) = self.article.as_ref().and_then(|a| a.history_id) {
                    let saved = self
                        .repository
                        .save_quiz_result(
                            history_id,
                            self.profile.id,
                            score,
                            Some(feedback.feedback),
                        )
                        .await;
                    if let Err(e) = saved {
                        self.storage_failed("save quiz result", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedBackend;
    use crate::models::sample_questions;

    struct Harness {
        app: App,
        backend: Arc<ScriptedBackend>,
        dir: tempfile::TempDir,
    }

    async fn harness(replies: Vec<Result<String>>, api_key: Option<&str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("history.db").to_string_lossy().to_string(),
            credentials_path: dir
                .path()
                .join("credentials.json")
                .to_string_lossy()
                .to_string(),
            profile_name: Some("Tester".to_string()),
            ..Config::default()
        };
        let backend = ScriptedBackend::new(replies);
        let gateway = AiGateway::new(backend.clone(), api_key.map(str::to_string));
        let repository = Repository::new(&config.db_path).await.unwrap();
        let credentials = CredentialStore::open(&config.credentials_path);
        let fetcher = ContentFetcher::new(Duration::from_secs(1)).unwrap();
        let app = App::with_services(&config, gateway, credentials, repository, fetcher)
            .await
            .unwrap();
        Harness {
            app,
            backend,
            dir,
        }
    }

    async fn next_task(app: &mut App) {
        let message = tokio::time::timeout(Duration::from_secs(5), app.task_rx.recv())
            .await
            .expect("background task finished")
            .expect("channel open");
        app.apply_task(message).await;
    }

    fn quiz_reply() -> String {
        let questions: Vec<_> = sample_questions(5)
            .iter()
            .map(|q| {
                serde_json::json!({
                    "question": q.question,
                    "options": q.options,
                    "answer": q.answer,
                })
            })
            .collect();
        serde_json::to_string(&questions).unwrap()
    }

    fn long_article() -> String {
        "Oceans absorb most of the extra heat trapped by greenhouse gases. ".repeat(5)
    }

    #[tokio::test]
    async fn starts_awaiting_credential_without_key() {
        let mut h = harness(vec![], None).await;
        assert_eq!(h.app.stage, Stage::AwaitingCredential);

        for c in "short".chars() {
            h.app.handle_action(AppAction::InputChar(c)).await;
        }
        h.app.handle_action(AppAction::ConfirmInput).await;
        assert_eq!(h.app.stage, Stage::AwaitingCredential);

        h.app
            .handle_action(AppAction::Paste("abcdefghij-key".to_string()))
            .await;
        h.app.handle_action(AppAction::ConfirmInput).await;
        assert_eq!(h.app.stage, Stage::Composing);
        assert!(h.app.gateway.has_credential());
        assert_eq!(
            h.app.credentials.get().unwrap().as_deref(),
            Some("shortabcdefghij-key")
        );
    }

    #[tokio::test]
    async fn submit_without_key_reopens_modal_without_calling_api() {
        let mut h = harness(vec![Ok("unused".to_string())], None).await;
        h.app.handle_action(AppAction::CancelInput).await;
        assert_eq!(h.app.stage, Stage::Composing);

        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;

        assert_eq!(h.app.stage, Stage::AwaitingCredential);
        assert_eq!(h.backend.calls(), 0);
    }

    #[tokio::test]
    async fn successful_summary_is_saved_to_history() {
        let mut h = harness(vec![Ok("Oceans are warming.".to_string())], Some("abcdefghij")).await;
        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        assert_eq!(h.app.stage, Stage::Summarizing);

        next_task(&mut h.app).await;

        assert_eq!(h.app.stage, Stage::Summarized);
        let article = h.app.article.clone().unwrap();
        assert_eq!(article.summary, "Oceans are warming.");
        assert!(article.history_id.is_some());

        h.app.handle_action(AppAction::ShowHistory).await;
        assert_eq!(h.app.history.len(), 1);
        assert_eq!(h.app.history[0].summary, "Oceans are warming.");
    }

    #[tokio::test]
    async fn short_text_is_rejected_locally() {
        let mut h = harness(vec![], Some("abcdefghij")).await;
        h.app.article_input = "Too short".to_string();
        h.app.handle_action(AppAction::Submit).await;

        assert_eq!(h.app.stage, Stage::Composing);
        assert_eq!(h.backend.calls(), 0);
        assert_eq!(
            h.app.notification.as_ref().map(|n| n.level),
            Some(NotificationLevel::Error)
        );
    }

    #[tokio::test]
    async fn failed_summary_returns_to_composing() {
        let mut h = harness(
            vec![Err(AppError::RemoteError("quota exceeded".to_string()))],
            Some("abcdefghij"),
        )
        .await;
        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        next_task(&mut h.app).await;

        assert_eq!(h.app.stage, Stage::Composing);
        assert_eq!(h.app.article_input, long_article());
        let message = &h.app.notification.as_ref().unwrap().message;
        assert!(message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn stale_results_are_discarded() {
        let mut h = harness(vec![], Some("abcdefghij")).await;
        h.app.article = Some(CurrentArticle {
            title: "t".into(),
            original_text: long_article(),
            summary: "s".into(),
            history_id: None,
        });
        h.app.stage = Stage::Summarized;

        let old = h.app.tokens.issue(OpKind::Answer);
        let new = h.app.tokens.issue(OpKind::Answer);

        h.app
            .apply_task(TaskMessage {
                kind: OpKind::Answer,
                token: new,
                result: Ok(TaskOutput::Answer {
                    question: "new?".into(),
                    answer: "fresh".into(),
                }),
            })
            .await;
        h.app
            .apply_task(TaskMessage {
                kind: OpKind::Answer,
                token: old,
                result: Ok(TaskOutput::Answer {
                    question: "old?".into(),
                    answer: "stale".into(),
                }),
            })
            .await;

        assert_eq!(h.app.answer.as_ref().unwrap().1, "fresh");
    }

    #[tokio::test]
    async fn new_article_invalidates_in_flight_summary() {
        let mut h = harness(vec![Ok("Late summary".to_string())], Some("abcdefghij")).await;
        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        h.app.handle_action(AppAction::NewArticle).await;

        next_task(&mut h.app).await;
        assert_eq!(h.app.stage, Stage::Composing);
        assert!(h.app.article.is_none());
    }

    #[tokio::test]
    async fn quiz_flow_scores_and_records_result() {
        let mut h = harness(
            vec![
                Ok("Summary text.".to_string()),
                Ok(quiz_reply()),
                Err(AppError::RemoteError("busy".to_string())),
            ],
            Some("abcdefghij"),
        )
        .await;

        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        next_task(&mut h.app).await;

        h.app.handle_action(AppAction::StartQuiz).await;
        next_task(&mut h.app).await;
        assert_eq!(h.app.stage, Stage::TakingQuiz);

        let answers: Vec<u8> = h
            .app
            .quiz
            .as_ref()
            .unwrap()
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| if i % 2 == 0 { q.answer } else { (q.answer + 1) % 4 })
            .collect();

        h.app.handle_action(AppAction::SubmitQuiz).await;
        assert_eq!(h.app.stage, Stage::TakingQuiz, "incomplete quiz is not submitted");

        for option in answers {
            h.app
                .handle_action(AppAction::SelectOption(option))
                .await;
        }
        h.app.handle_action(AppAction::SubmitQuiz).await;
        next_task(&mut h.app).await;

        assert_eq!(h.app.stage, Stage::QuizScored);
        let result = h.app.quiz.as_ref().unwrap().result.clone().unwrap();
        assert_eq!(result.score_percent, 60);
        assert_eq!(result.feedback, crate::models::FAILED_FEEDBACK);

        h.app.handle_action(AppAction::ShowHistory).await;
        let quiz = h.app.history[0].quiz.as_ref().unwrap();
        assert_eq!(quiz.score, 60);
    }

    #[tokio::test]
    async fn quiz_generation_failure_stays_on_summary() {
        let mut h = harness(
            vec![Ok("Summary text.".to_string()), Ok("No questions today.".to_string())],
            Some("abcdefghij"),
        )
        .await;
        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        next_task(&mut h.app).await;

        h.app.handle_action(AppAction::StartQuiz).await;
        next_task(&mut h.app).await;

        assert_eq!(h.app.stage, Stage::Summarized);
        assert!(h.app.quiz.is_none());
        assert_eq!(
            h.app.notification.as_ref().map(|n| n.level),
            Some(NotificationLevel::Error)
        );
    }

    #[tokio::test]
    async fn short_questions_are_not_sent() {
        let mut h = harness(vec![], Some("abcdefghij")).await;
        h.app.article = Some(CurrentArticle {
            title: "t".into(),
            original_text: long_article(),
            summary: "s".into(),
            history_id: None,
        });
        h.app.stage = Stage::Summarized;

        h.app.handle_action(AppAction::AskQuestion).await;
        assert_eq!(h.app.key_context(), KeyContext::LinePrompt);
        h.app.handle_action(AppAction::InputChar('w')).await;
        h.app.handle_action(AppAction::ConfirmInput).await;

        assert!(h.app.prompt.is_none());
        assert!(!h.app.is_busy(OpKind::Answer));
        assert_eq!(h.backend.calls(), 0);
    }

    #[tokio::test]
    async fn history_write_failure_keeps_the_summary() {
        let mut h = harness(vec![Ok("Oceans are warming.".to_string())], Some("abcdefghij")).await;
        let db = rusqlite::Connection::open(h.dir.path().join("history.db")).unwrap();
        db.execute_batch("DROP TABLE quiz_results; DROP TABLE article_history;")
            .unwrap();
        drop(db);

        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        next_task(&mut h.app).await;

        assert_eq!(h.app.stage, Stage::Summarized);
        let article = h.app.article.clone().unwrap();
        assert_eq!(article.summary, "Oceans are warming.");
        assert_eq!(article.history_id, None);
        assert_eq!(
            h.app.notification.as_ref().map(|n| n.level),
            Some(NotificationLevel::Error)
        );

        let quit = h.app.handle_action(AppAction::ShowHistory).await;
        assert!(!quit);
        assert_eq!(h.app.view, View::History);
        assert!(h.app.history.is_empty());
    }

    #[tokio::test]
    async fn submitted_quiz_ignores_further_input() {
        let mut h = harness(
            vec![
                Ok("Summary text.".to_string()),
                Ok(quiz_reply()),
                Ok("Nicely done.".to_string()),
                Ok("Second feedback.".to_string()),
            ],
            Some("abcdefghij"),
        )
        .await;
        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        next_task(&mut h.app).await;
        h.app.handle_action(AppAction::StartQuiz).await;
        next_task(&mut h.app).await;

        for _ in 0..5 {
            h.app.handle_action(AppAction::SelectOption(0)).await;
        }
        h.app.handle_action(AppAction::SubmitQuiz).await;
        let submitted = h.app.quiz.as_ref().unwrap().attempt.selected.clone();

        h.app.handle_action(AppAction::SelectOption(2)).await;
        h.app.handle_action(AppAction::SubmitQuiz).await;
        assert_eq!(h.app.quiz.as_ref().unwrap().attempt.selected, submitted);

        next_task(&mut h.app).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.app.task_rx.try_recv().is_err());
        assert_eq!(h.backend.calls(), 3);
        assert_eq!(h.app.stage, Stage::QuizScored);
        assert_eq!(
            h.app.quiz.as_ref().unwrap().result.as_ref().unwrap().feedback,
            "Nicely done."
        );
    }

    #[tokio::test]
    async fn summary_arriving_under_key_modal_keeps_it_open() {
        let mut h = harness(vec![Ok("Late summary".to_string())], Some("abcdefghij")).await;
        h.app.article_input = long_article();
        h.app.handle_action(AppAction::Submit).await;
        h.app.handle_action(AppAction::OpenCredentialModal).await;
        h.app.handle_action(AppAction::InputChar('x')).await;

        next_task(&mut h.app).await;
        assert_eq!(h.app.key_context(), KeyContext::CredentialModal);
        assert_eq!(h.app.key_input, "x");
        assert!(h.app.article.is_some());

        h.app.handle_action(AppAction::CancelInput).await;
        assert_eq!(h.app.stage, Stage::Summarized);
        assert_eq!(h.app.return_stage, None);
    }

    #[tokio::test]
    async fn loading_a_sample_names_it() {
        let mut h = harness(vec![Ok("Sample summary".to_string())], Some("abcdefghij")).await;
        h.app.handle_action(AppAction::LoadSample).await;

        assert_eq!(h.app.stage, Stage::Summarizing);
        assert_eq!(h.app.length_percent, SAMPLE_LENGTH_PERCENT);
        let message = &h.app.notification.as_ref().unwrap().message;
        assert!(message.starts_with("Loaded sample: "));
    }

    #[test]
    fn tabs_wrap_around() {
        assert_eq!(ResultTab::Summary.shift(false), ResultTab::References);
        assert_eq!(ResultTab::References.shift(true), ResultTab::Summary);
    }
}
