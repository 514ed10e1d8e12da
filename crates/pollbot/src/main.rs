use std::sync::Arc;

use pollbot_core::{
    bot::{Bot, SendPhoto},
    commands::CommandSpec,
    config::Config,
    engine::Engine,
    events::BotEvent,
    formatting::{command_list_html, escape_html},
    handler::{respond, HandlerResult},
    messaging::{
        keyboard::{InlineKeyboardButton, InlineKeyboardInput},
        types::{CallbackQuery, Message},
    },
};
use pollbot_telegram::HttpBotApi;
use tokio_util::sync::CancellationToken;

const MENU: &[(&str, &str)] = &[
    ("help", "Show this list"),
    ("setname", "Tell me your name"),
    ("cancel", "Cancel the current input"),
    ("poll", "Answer a quick poll"),
    ("whoami", "Show what Telegram knows about you"),
    ("logo", "Send a picture"),
];

const LOGO_URL: &str = "https://telegram.org/img/t_logo.png";

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    let text = format!(
        "<b>Commands</b>\n{}",
        command_list_html(MENU.iter().copied())
    );
    bot.send_message(msg.chat_id(), &text).await?;
    respond()
}

async fn ask_name(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat_id(), "What should I call you? /cancel to stop.")
        .await?;
    respond()
}

async fn got_name(bot: Bot, name: String, msg: Message) -> HandlerResult {
    let text = format!("Nice to meet you, <b>{}</b>.", escape_html(name.trim()));
    bot.send_message(msg.chat_id(), &text).await?;
    respond()
}

async fn cancel(bot: Bot, msg: Message) -> HandlerResult {
    let text = match bot.cancel_text_input(msg.chat_id()).await {
        Some(name) => format!("Stopped waiting for /{}.", escape_html(&name)),
        None => "Nothing to cancel.".to_string(),
    };
    bot.send_message(msg.chat_id(), &text).await?;
    respond()
}

async fn poll(bot: Bot, msg: Message) -> HandlerResult {
    let keyboard = InlineKeyboardInput::new("poll")?
        .row(vec![
            InlineKeyboardButton::new("Yes", "yes"),
            InlineKeyboardButton::new("No", "no"),
        ])?
        .with_action(vote);
    bot.send_inline_keyboard(msg.chat_id(), "Do you like polling bots?", keyboard)
        .await?;
    respond()
}

async fn vote(bot: Bot, query: CallbackQuery) -> HandlerResult {
    bot.answer(&query).await?;

    // One vote per message: drop the buttons.
    bot.edit_callback_keyboard(&query, InlineKeyboardInput::new("poll")?)
        .await?;

    let text = format!(
        "{} voted <b>{}</b>.",
        escape_html(&query.from.display_name()),
        escape_html(&query.input_data)
    );
    bot.send_message(query.chat_id(), &text).await?;
    respond()
}

async fn whoami(bot: Bot, msg: Message) -> HandlerResult {
    let Some(from) = &msg.from else {
        return respond();
    };
    let text = match bot.get_user_info(from.id.0).await?.ok() {
        Some(user) => format!(
            "id: <code>{}</code>\nname: {}\nusername: {}",
            user.id.0,
            escape_html(&user.display_name()),
            escape_html(user.username.as_deref().unwrap_or("-"))
        ),
        None => "Telegram would not tell me.".to_string(),
    };
    bot.send_message(msg.chat_id(), &text).await?;
    respond()
}

async fn logo(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_photo(
        SendPhoto::new(msg.chat_id())
            .from_url(LOGO_URL)
            .caption("Sent with <i>sendPhoto</i>"),
    )
    .await?;
    respond()
}

async fn not_from_bots(_bot: Bot, msg: Message) -> anyhow::Result<bool> {
    Ok(!msg.from.as_ref().and_then(|u| u.is_bot).unwrap_or(false))
}

async fn unknown_command(bot: Bot, msg: Option<Message>) -> HandlerResult {
    if let Some(msg) = msg {
        bot.send_message(msg.chat_id(), "Unknown command. Try /help.")
            .await?;
    }
    respond()
}

async fn plain_text(bot: Bot, msg: Option<Message>) -> HandlerResult {
    if let Some(msg) = msg {
        tracing::info!(chat_id = %msg.chat_id(), "text without pending command");
        bot.send_message(msg.chat_id(), "Send /help to see what I can do.")
            .await?;
    }
    respond()
}

fn build(engine: &mut Engine) -> pollbot_core::Result<()> {
    let help_texts = |name: &str| {
        MENU.iter()
            .find(|(cmd, _)| *cmd == name)
            .map(|(_, desc)| *desc)
            .unwrap_or_default()
    };

    engine.register_command(CommandSpec::new(["start", "help"], help).help([help_texts("help")]))?;
    engine.register_command(
        CommandSpec::new(["setname"], ask_name)
            .text_input(got_name)
            .help([help_texts("setname")]),
    )?;
    engine.register_command(CommandSpec::new(["cancel"], cancel).help([help_texts("cancel")]))?;
    engine.register_command(CommandSpec::new(["poll"], poll).help([help_texts("poll")]))?;
    engine.register_command(CommandSpec::new(["whoami"], whoami).help([help_texts("whoami")]))?;
    engine.register_command(CommandSpec::new(["logo"], logo).help([help_texts("logo")]))?;
    engine.register_gate(not_from_bots);

    engine.on(BotEvent::Start, |_bot: Bot, _msg: Option<Message>| async {
        tracing::info!("bot is up");
        respond()
    });
    engine.on(BotEvent::Stop, |_bot: Bot, _msg: Option<Message>| async {
        tracing::info!("bot is shutting down");
        respond()
    });
    engine.on(BotEvent::IncorrectCommand, unknown_command);
    engine.on_event("new_text_message", plain_text)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), pollbot_core::Error> {
    pollbot_core::logging::init("pollbot")?;

    let cfg = Arc::new(Config::load()?);
    let api = Arc::new(HttpBotApi::new(&cfg)?);

    let mut engine = Engine::new(api, cfg);
    build(&mut engine)?;

    if let Err(e) = engine.set_bot_commands_info(None).await {
        tracing::warn!(error = %e, "could not publish command menu");
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received");
            on_signal.cancel();
        }
    });

    engine.run(shutdown).await
}
