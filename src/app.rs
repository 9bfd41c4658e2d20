use std::sync::Arc;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use busguardian::ai::OllamaClient;
use busguardian::provider::build_client;
use busguardian::{
    CompletionClient, CompletionFailure, Config, Notice, PendingTurn, Provider, SensorField, Session, TurnController, TurnReply,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sensors,
    Chat,
    Input,
}

/// Ticks a notice stays visible (about four seconds).
const NOTICE_TICKS: u8 = 14;

/// A turn whose completion runs on a background task.
pub struct TurnTask {
    pending: PendingTurn,
    handle: JoinHandle<Result<TurnReply, CompletionFailure>>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Sensor panel
    pub selected_field: SensorField,

    // Chat state
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub info_scroll: u16,

    // Session and turns
    pub session: Session,
    controller: Option<TurnController>,
    analyze_task: Option<TurnTask>,
    ask_task: Option<TurnTask>,

    // Notices
    notices_seen: usize,
    notice_ticks: u8,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Provider state
    pub config: Config,
    pub current_provider: Provider,
    pub selected_model: String,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // Panel areas for mouse hit-testing (updated during render)
    pub sensor_area: Option<Rect>,
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(config: Config, provider: Provider, model: String) -> Self {
        match build_client(provider, &model, &config) {
            Some(client) => Self::with_client(config, provider, model, client),
            None => Self::build(config, provider, model, None),
        }
    }

    /// Dashboard driven by an already built completion client.
    pub fn with_client(config: Config, provider: Provider, model: String, client: Arc<dyn CompletionClient>) -> Self {
        Self::build(config, provider, model, Some(client))
    }

    fn build(config: Config, provider: Provider, model: String, client: Option<Arc<dyn CompletionClient>>) -> Self {
        let controller = client.map(TurnController::new);

        let mut session = Session::default();
        if controller.is_none() {
            tracing::warn!(provider = provider.as_str(), "no API key configured");
            session.notify(Notice::error(&format!(
                "{} API key not configured. Set it in the environment or press P to pick another provider.",
                provider.display_name()
            )));
        }

        Self {
            should_quit: false,
            screen: Screen::Dashboard,
            input_mode: InputMode::Normal,
            focus: FocusPane::Sensors,

            selected_field: SensorField::EngineTemperature,

            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            info_scroll: 0,

            session,
            controller,
            analyze_task: None,
            ask_task: None,

            notices_seen: 0,
            notice_ticks: 0,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            config,
            current_provider: provider,
            selected_model: model,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            sensor_area: None,
            chat_area: None,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.session.is_analyze_pending()
    }

    pub fn is_answering(&self) -> bool {
        self.session.is_ask_pending()
    }

    // Sensor panel actions
    pub fn field_down(&mut self) {
        self.selected_field = self.selected_field.next();
    }

    pub fn field_up(&mut self) {
        self.selected_field = self.selected_field.prev();
    }

    pub fn adjust_selected(&mut self, steps: i32) {
        // Widgets are disabled while an analysis runs
        if !self.is_analyzing() {
            self.session.adjust_sensor(self.selected_field, steps);
        }
    }

    // Turns

    fn spawn(controller: &TurnController, pending: PendingTurn) -> TurnTask {
        let client = controller.client();
        let request = pending.request().clone();
        let handle = tokio::spawn(async move { TurnController::execute(client.as_ref(), &request).await });
        TurnTask { pending, handle }
    }

    fn missing_client_notice(&mut self) {
        self.session.notify(Notice::error(&format!(
            "{} API key not configured. Press P to pick another provider.",
            self.current_provider.display_name()
        )));
    }

    pub fn start_analyze(&mut self) {
        let Some(controller) = self.controller.as_ref() else {
            self.missing_client_notice();
            return;
        };
        if let Some(pending) = controller.prepare_analyze(&mut self.session) {
            self.analyze_task = Some(Self::spawn(controller, pending));
            self.scroll_chat_to_bottom();
        }
    }

    /// Sends the input box contents. Ignored while an answer is pending.
    pub fn send_question(&mut self) {
        if self.is_answering() {
            return;
        }
        let Some(controller) = self.controller.as_ref() else {
            self.missing_client_notice();
            return;
        };

        let text = std::mem::take(&mut self.chat_input);
        self.chat_cursor = 0;
        if let Some(pending) = controller.prepare_ask(&mut self.session, &text) {
            self.ask_task = Some(Self::spawn(controller, pending));
            self.scroll_chat_to_bottom();
        }
    }

    /// Resolve any finished background turns.
    pub async fn poll_tasks(&mut self) {
        let Some(controller) = self.controller.as_ref() else {
            return;
        };

        let mut resolved = false;
        for slot in [&mut self.analyze_task, &mut self.ask_task] {
            if !slot.as_ref().is_some_and(|task| task.handle.is_finished()) {
                continue;
            }
            if let Some(TurnTask { pending, handle }) = slot.take() {
                let result = handle
                    .await
                    .unwrap_or_else(|e| Err(CompletionFailure::new(format!("completion task failed: {}", e))));
                controller.resolve(&mut self.session, pending, result);
                resolved = true;
            }
        }

        if resolved {
            self.scroll_chat_to_bottom();
        }
    }

    /// Tick animation frame and notice timer (called by Tick event)
    pub fn tick(&mut self) {
        if self.is_analyzing() || self.is_answering() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        let count = self.session.notices().len();
        if count > self.notices_seen {
            self.notices_seen = count;
            self.notice_ticks = NOTICE_TICKS;
        } else {
            self.notice_ticks = self.notice_ticks.saturating_sub(1);
        }
    }

    /// The notice to show right now, if any.
    pub fn visible_notice(&self) -> Option<&Notice> {
        let fresh = self.session.notices().len() > self.notices_seen;
        if fresh || self.notice_ticks > 0 {
            self.session.latest_notice()
        } else {
            None
        }
    }

    /// Scroll chat to bottom so the latest message (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.session.history().messages() {
            total_lines = total_lines.saturating_add(1); // Role line
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { char_count / wrap_width + 1 };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.is_answering() || self.is_analyzing() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    // Provider and model pickers

    pub fn open_provider_picker(&mut self) {
        let current_idx = Provider::all()
            .iter()
            .position(|p| *p == self.current_provider)
            .unwrap_or(0);
        self.provider_picker_state.select(Some(current_idx));
        self.show_provider_picker = true;
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub async fn models_for_provider(&self, provider: Provider) -> Vec<String> {
        match provider {
            Provider::Ollama => OllamaClient::new(&self.config.ollama_url(), provider.default_model())
                .list_models()
                .await
                .unwrap_or_default(),
            _ => provider.known_models(),
        }
    }

    /// Switch to the highlighted provider. Providers without a key are refused.
    pub async fn select_provider(&mut self) {
        self.show_provider_picker = false;
        let Some(provider) = self
            .provider_picker_state
            .selected()
            .and_then(|i| Provider::all().get(i).copied())
        else {
            return;
        };

        if provider.needs_api_key() && self.config.key_source(provider).is_none() {
            self.session.notify(Notice::error(&format!(
                "{} API key not configured. Add it to the environment or config file.",
                provider.display_name()
            )));
            return;
        }

        let model = self
            .models_for_provider(provider)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| provider.default_model().to_string());
        self.switch_client(provider, model);
    }

    pub async fn open_model_picker(&mut self) {
        self.available_models = self.models_for_provider(self.current_provider).await;
        if self.available_models.is_empty() {
            return;
        }
        let current_idx = self
            .available_models
            .iter()
            .position(|m| m == &self.selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        self.show_model_picker = false;
        if let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i).cloned())
        {
            self.switch_client(self.current_provider, model);
        }
    }

    /// Rebuild the client; in-flight turns keep the client they started with.
    fn switch_client(&mut self, provider: Provider, model: String) {
        let Some(client) = build_client(provider, &model, &self.config) else {
            return;
        };
        match self.controller.as_mut() {
            Some(controller) => controller.set_client(client),
            None => self.controller = Some(TurnController::new(client)),
        }

        tracing::info!(provider = provider.as_str(), model = %model, "switched model");
        self.config.remember_selection(provider, &model);
        if let Err(e) = self.config.save() {
            tracing::warn!(error = %e, "could not save config");
        }
        self.session.notify(Notice::info(
            "Model",
            &format!("Now using {} with {}", provider.display_name(), model),
        ));
        self.current_provider = provider;
        self.selected_model = model;
    }
}
