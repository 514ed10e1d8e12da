use std::{path::PathBuf, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    domain::{ChatId, MessageId},
    errors::Error,
    messaging::{
        keyboard::{InlineKeyboardInput, KeyboardRegistry},
        port::{ApiRequest, BotApi},
        types::{decode_reply, ApiReply, BotCommandInfo, CallbackQuery, Message, RawUpdate, User},
    },
    session::{PendingCommand, SessionStore},
    Result,
};

/// Per-call overrides of the configured message defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextOptions {
    pub parse_mode: Option<String>,
    pub disable_web_page_preview: bool,
}

impl TextOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            parse_mode: cfg.parse_mode.clone(),
            disable_web_page_preview: cfg.disable_web_page_preview,
        }
    }

    pub fn plain(mut self) -> Self {
        self.parse_mode = None;
        self
    }

    pub fn parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = Some(mode.into());
        self
    }

    pub fn link_preview(mut self, enabled: bool) -> Self {
        self.disable_web_page_preview = !enabled;
        self
    }
}

/// `sendPhoto` parameters. Exactly one of URL or file must be set.
#[derive(Clone, Debug, Default)]
pub struct SendPhoto {
    chat_id: Option<ChatId>,
    url: Option<String>,
    file: Option<PathBuf>,
    caption: String,
    parse_mode: Option<String>,
    show_caption_above_media: bool,
    has_spoiler: bool,
}

impl SendPhoto {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::default()
        }
    }

    pub fn from_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = Some(mode.into());
        self
    }

    pub fn caption_above(mut self, above: bool) -> Self {
        self.show_caption_above_media = above;
        self
    }

    pub fn spoiler(mut self, spoiler: bool) -> Self {
        self.has_spoiler = spoiler;
        self
    }

    fn into_request(self, default_parse_mode: Option<&str>) -> Result<ApiRequest> {
        let chat_id = self
            .chat_id
            .ok_or_else(|| Error::Config("sendPhoto needs a chat id".into()))?;
        let parse_mode = self
            .parse_mode
            .or_else(|| default_parse_mode.map(str::to_string));

        let req = ApiRequest::post("sendPhoto")
            .param("chat_id", chat_id)
            .param("caption", self.caption)
            .param_opt("parse_mode", parse_mode)
            .param("show_caption_above_media", self.show_caption_above_media)
            .param("has_spoiler", self.has_spoiler);

        match (self.url, self.file) {
            (Some(url), None) => Ok(req.param("photo", url)),
            (None, Some(path)) => Ok(req.upload("photo", path)),
            (None, None) => Err(Error::Config(
                "sendPhoto needs a photo URL or a file path".into(),
            )),
            (Some(_), Some(_)) => Err(Error::Config(
                "sendPhoto takes either a photo URL or a file path, not both".into(),
            )),
        }
    }
}

/// Cloneable handle given to every handler.
///
/// Wraps the transport port plus the runtime state handlers may touch: the
/// per-chat session map and the inline keyboard registry. Locks are never
/// held while user code runs.
#[derive(Clone)]
pub struct Bot {
    api: Arc<dyn BotApi>,
    cfg: Arc<Config>,
    sessions: Arc<Mutex<SessionStore>>,
    keyboards: Arc<Mutex<KeyboardRegistry>>,
}

impl Bot {
    pub fn new(api: Arc<dyn BotApi>, cfg: Arc<Config>) -> Self {
        Self {
            api,
            cfg,
            sessions: Arc::new(Mutex::new(SessionStore::new())),
            keyboards: Arc::new(Mutex::new(KeyboardRegistry::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn text_options(&self) -> TextOptions {
        TextOptions::from_config(&self.cfg)
    }

    pub(crate) fn sessions(&self) -> &Mutex<SessionStore> {
        &self.sessions
    }

    pub(crate) fn keyboards(&self) -> &Mutex<KeyboardRegistry> {
        &self.keyboards
    }

    async fn call<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<ApiReply<T>> {
        let method = req.method;
        let reply = decode_reply(self.api.execute(req).await?)?;
        if let ApiReply::Rejected(_) = &reply {
            tracing::warn!(
                method,
                reason = reply.rejection_description().unwrap_or("unknown"),
                "bot api rejected request"
            );
        }
        Ok(reply)
    }

    // ============== Updates ==============

    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
        limit: u32,
    ) -> Result<ApiReply<Vec<RawUpdate>>> {
        let req = ApiRequest::get("getUpdates")
            .param("offset", offset)
            .param("limit", limit)
            .param("timeout", timeout.as_secs());
        self.call(req).await
    }

    // ============== Messages ==============

    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<ApiReply<Message>> {
        self.send_message_with(chat_id, text, &self.text_options())
            .await
    }

    pub async fn send_message_with(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: &TextOptions,
    ) -> Result<ApiReply<Message>> {
        self.call(text_request("sendMessage", chat_id, text, opts))
            .await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<ApiReply<Message>> {
        let req = text_request("editMessageText", chat_id, text, &self.text_options())
            .param("message_id", message_id.0);
        self.call(req).await
    }

    /// Edit `msg` in place; on success the local copy is replaced with the server's.
    pub async fn edit_message(&self, msg: &mut Message, text: &str) -> Result<bool> {
        match self
            .edit_message_text(msg.chat_id(), msg.message_id, text)
            .await?
        {
            ApiReply::Ok(updated) => {
                *msg = updated;
                Ok(true)
            }
            ApiReply::Rejected(_) => Ok(false),
        }
    }

    pub async fn send_photo(&self, photo: SendPhoto) -> Result<ApiReply<Message>> {
        let req = photo.into_request(self.cfg.parse_mode.as_deref())?;
        self.call(req).await
    }

    /// Look a user (or any chat) up with `getChat`.
    pub async fn get_user_info(&self, id: i64) -> Result<ApiReply<User>> {
        self.call(ApiRequest::get("getChat").param("chat_id", id))
            .await
    }

    // ============== Inline keyboards ==============

    /// Send `text` with the keyboard attached and make it the live keyboard for
    /// its name, replacing whatever was registered under that name before.
    pub async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboardInput,
    ) -> Result<ApiReply<Message>> {
        let markup = keyboard.markup().to_param()?;
        let req = text_request("sendMessage", chat_id, text, &self.text_options())
            .param_opt("reply_markup", markup);
        self.keyboards.lock().await.register(keyboard);
        self.call(req).await
    }

    /// Replace the buttons of an already sent message. An empty keyboard
    /// removes the markup.
    pub async fn edit_inline_keyboard(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        keyboard: InlineKeyboardInput,
    ) -> Result<ApiReply<Message>> {
        let markup = keyboard.markup().to_param()?;
        let req = ApiRequest::get("editMessageReplyMarkup")
            .param("chat_id", chat_id)
            .param("message_id", message_id.0)
            .param_opt("reply_markup", markup);
        self.keyboards.lock().await.register(keyboard);
        self.call(req).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<ApiReply<bool>> {
        self.call(ApiRequest::get("answerCallbackQuery").param("callback_query_id", callback_query_id))
            .await
    }

    /// Acknowledge `query` so the client stops showing a spinner.
    pub async fn answer(&self, query: &CallbackQuery) -> Result<ApiReply<bool>> {
        self.answer_callback_query(&query.id).await
    }

    /// Edit the keyboard of the message `query` was pressed on.
    pub async fn edit_callback_keyboard(
        &self,
        query: &CallbackQuery,
        keyboard: InlineKeyboardInput,
    ) -> Result<ApiReply<Message>> {
        let message = query.message.as_ref().ok_or_else(|| {
            Error::Config("callback query has no originating message to edit".into())
        })?;
        self.edit_inline_keyboard(message.chat_id(), message.message_id, keyboard)
            .await
    }

    // ============== Command menu ==============

    pub async fn set_my_commands(&self, commands: &[BotCommandInfo]) -> Result<ApiReply<bool>> {
        let req = ApiRequest::get("setMyCommands").param("commands", serde_json::to_string(commands)?);
        self.call(req).await
    }

    pub async fn delete_my_commands(&self) -> Result<ApiReply<bool>> {
        self.call(ApiRequest::get("deleteMyCommands")).await
    }

    // ============== Sessions ==============

    /// Stop routing this chat's plain text to the pending command's
    /// continuation. Returns the cancelled command name.
    pub async fn cancel_text_input(&self, chat_id: ChatId) -> Option<String> {
        self.sessions.lock().await.cancel(chat_id)
    }

    pub async fn pending_command(&self, chat_id: ChatId) -> Option<PendingCommand> {
        self.sessions.lock().await.pending(chat_id).cloned()
    }
}

fn text_request(method: &'static str, chat_id: ChatId, text: &str, opts: &TextOptions) -> ApiRequest {
    ApiRequest::get(method)
        .param("chat_id", chat_id)
        .param("text", text)
        .param_opt("parse_mode", opts.parse_mode.as_deref())
        .param("disable_web_page_preview", opts.disable_web_page_preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handler::{respond, HandlerResult},
        messaging::keyboard::InlineKeyboardButton,
        testing::FakeApi,
    };
    use serde_json::json;

    async fn ack(bot: Bot, q: CallbackQuery) -> HandlerResult {
        bot.answer(&q).await?;
        respond()
    }

    fn setup() -> (Arc<FakeApi>, Bot) {
        let api = FakeApi::new();
        let bot = Bot::new(api.clone(), Arc::new(Config::with_token("t")));
        (api, bot)
    }

    fn poll() -> InlineKeyboardInput {
        InlineKeyboardInput::new("poll1")
            .unwrap()
            .row(vec![
                InlineKeyboardButton::new("Yes", "yes"),
                InlineKeyboardButton::new("No", "no"),
            ])
            .unwrap()
    }

    #[tokio::test]
    async fn send_message_uses_configured_defaults() {
        let (api, bot) = setup();
        let reply = bot.send_message(ChatId(5), "<b>hi</b>").await.unwrap();

        let msg = reply.ok().unwrap();
        assert_eq!(msg.chat_id(), ChatId(5));

        let req = api.last_call("sendMessage").unwrap();
        assert_eq!(req.param_value("chat_id"), Some("5"));
        assert_eq!(req.param_value("text"), Some("<b>hi</b>"));
        assert_eq!(req.param_value("parse_mode"), Some("HTML"));
        assert_eq!(req.param_value("disable_web_page_preview"), Some("true"));
    }

    #[tokio::test]
    async fn plain_options_drop_parse_mode() {
        let (api, bot) = setup();
        let opts = bot.text_options().plain().link_preview(true);
        bot.send_message_with(ChatId(5), "a < b", &opts).await.unwrap();

        let req = api.last_call("sendMessage").unwrap();
        assert_eq!(req.param_value("parse_mode"), None);
        assert_eq!(req.param_value("disable_web_page_preview"), Some("false"));
    }

    #[tokio::test]
    async fn rejection_is_returned_raw() {
        let (api, bot) = setup();
        let raw = json!({"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"});
        api.reject_next("sendMessage", raw.clone());

        let reply = bot.send_message(ChatId(5), "hi").await.unwrap();
        assert_eq!(reply, ApiReply::Rejected(raw));
    }

    #[tokio::test]
    async fn send_inline_keyboard_registers_and_encodes_markup() {
        let (api, bot) = setup();
        bot.send_inline_keyboard(ChatId(1), "Vote?", poll().with_action(ack))
            .await
            .unwrap();

        assert!(bot.keyboards().lock().await.action_for("poll1").is_some());

        let req = api.last_call("sendMessage").unwrap();
        let markup: serde_json::Value =
            serde_json::from_str(req.param_value("reply_markup").unwrap()).unwrap();
        assert_eq!(
            markup,
            json!({"inline_keyboard": [[
                {"text": "Yes", "callback_data": "poll1_yes"},
                {"text": "No", "callback_data": "poll1_no"}
            ]]})
        );
    }

    #[tokio::test]
    async fn later_send_replaces_keyboard_for_same_name() {
        let (_api, bot) = setup();
        bot.send_inline_keyboard(ChatId(1), "first", poll().with_action(ack))
            .await
            .unwrap();
        bot.send_inline_keyboard(ChatId(1), "second", poll())
            .await
            .unwrap();

        let keyboards = bot.keyboards().lock().await;
        assert_eq!(keyboards.len(), 1);
        assert!(keyboards.action_for("poll1").is_none());
    }

    #[tokio::test]
    async fn editing_to_empty_keyboard_clears_markup() {
        let (api, bot) = setup();
        let mut kb = poll();
        kb.clear();
        bot.edit_inline_keyboard(ChatId(1), MessageId(10), kb)
            .await
            .unwrap();

        let req = api.last_call("editMessageReplyMarkup").unwrap();
        assert_eq!(req.param_value("chat_id"), Some("1"));
        assert_eq!(req.param_value("message_id"), Some("10"));
        assert_eq!(req.param_value("reply_markup"), None);
    }

    #[tokio::test]
    async fn editing_with_rows_sends_markup() {
        let (api, bot) = setup();
        bot.edit_inline_keyboard(ChatId(1), MessageId(10), poll())
            .await
            .unwrap();
        let req = api.last_call("editMessageReplyMarkup").unwrap();
        assert!(req.param_value("reply_markup").unwrap().contains("poll1_no"));
    }

    #[tokio::test]
    async fn send_photo_without_source_fails_before_any_request() {
        let (api, bot) = setup();
        let err = bot
            .send_photo(SendPhoto::new(ChatId(1)).caption("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = bot
            .send_photo(
                SendPhoto::new(ChatId(1))
                    .from_url("https://example.com/a.png")
                    .from_file("/tmp/a.png"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn send_photo_by_url_and_by_file() {
        let (api, bot) = setup();
        bot.send_photo(
            SendPhoto::new(ChatId(3))
                .from_url("https://example.com/a.png")
                .caption("cap")
                .spoiler(true),
        )
        .await
        .unwrap();
        let req = api.last_call("sendPhoto").unwrap();
        assert_eq!(req.verb, crate::messaging::port::HttpVerb::Post);
        assert_eq!(req.param_value("photo"), Some("https://example.com/a.png"));
        assert_eq!(req.param_value("has_spoiler"), Some("true"));
        assert_eq!(req.param_value("show_caption_above_media"), Some("false"));
        assert_eq!(req.param_value("parse_mode"), Some("HTML"));
        assert!(req.upload.is_none());

        bot.send_photo(SendPhoto::new(ChatId(3)).from_file("/tmp/a.png"))
            .await
            .unwrap();
        let req = api.last_call("sendPhoto").unwrap();
        assert_eq!(req.param_value("photo"), None);
        let upload = req.upload.unwrap();
        assert_eq!(upload.field, "photo");
        assert_eq!(upload.path, PathBuf::from("/tmp/a.png"));
    }

    #[tokio::test]
    async fn edit_message_updates_local_copy() {
        let (_api, bot) = setup();
        let mut msg = bot.send_message(ChatId(2), "old").await.unwrap().ok().unwrap();
        assert!(bot.edit_message(&mut msg, "new").await.unwrap());
        assert_eq!(msg.text(), "new");
    }

    #[tokio::test]
    async fn set_my_commands_serializes_list() {
        let (api, bot) = setup();
        bot.set_my_commands(&[BotCommandInfo {
            command: "help".into(),
            description: "Show help".into(),
        }])
        .await
        .unwrap();
        let req = api.last_call("setMyCommands").unwrap();
        assert_eq!(
            req.param_value("commands"),
            Some(r#"[{"command":"help","description":"Show help"}]"#)
        );

        assert!(bot.delete_my_commands().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancel_text_input_reports_cancelled_command() {
        let (_api, bot) = setup();
        bot.sessions().lock().await.record(ChatId(4), "setname", true);

        assert_eq!(bot.cancel_text_input(ChatId(4)).await, Some("setname".into()));
        assert_eq!(bot.cancel_text_input(ChatId(4)).await, None);
        assert!(bot.pending_command(ChatId(4)).await.is_none());
    }
}
