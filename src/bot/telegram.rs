//! Telegram runtime: turns updates into [`InboundEvent`]s, routes them and
//! delivers the replies.

use super::event::{InboundEvent, OutboundMessage};
use super::handlers::default_registry;
use super::resilient::deliver;
use super::router::Router;
use crate::backend::{Backends, HttpTransport, ReqwestTransport};
use crate::config::Settings;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, info};

/// Run the Telegram bot until Ctrl-C.
pub async fn run_bot(settings: Settings) {
    let router = init_router(&settings);

    let bot = Bot::new(settings.token_bot.clone());
    let handler = setup_handler();

    info!(
        bot = settings.nombre_bot.as_deref().unwrap_or("MetaMapaBot"),
        handlers = router.handler_count(),
        "Bot is running..."
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_router(settings: &Settings) -> Arc<Router> {
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(settings.connect_timeout()));

    match Backends::from_settings(settings, transport) {
        Ok(backends) => {
            info!(
                max_attempts = settings.http_max_attempts,
                timeout_secs = settings.http_timeout_secs,
                "Backends configured."
            );
            Arc::new(Router::new(default_registry(&backends)))
        }
        Err(e) => {
            error!("Failed to configure backends: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handle_text),
        )
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    router: Arc<Router>,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    let event = InboundEvent::text(msg.chat.id.0, text);
    let replies = router.route(&event).await;
    deliver_all(&bot, &replies).await;
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    router: Arc<Router>,
) -> Result<(), teloxide::RequestError> {
    // Stop the client-side spinner whatever happens next
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        debug!("Failed to answer callback query: {}", e);
    }

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        debug!("Callback query without data or message, ignoring");
        return respond(());
    };

    let event = InboundEvent::callback(message.chat().id.0, message.id().0, data);
    let replies = router.route(&event).await;
    deliver_all(&bot, &replies).await;
    respond(())
}

async fn deliver_all(bot: &Bot, replies: &[OutboundMessage]) {
    for reply in replies {
        if let Err(e) = deliver(bot, reply).await {
            error!(chat_id = reply.chat_id, "Failed to deliver reply: {}", e);
        }
    }
}
