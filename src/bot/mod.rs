//! Telegram front end
//!
//! One long-polling loop owns every chat's [`Dialogue`]. Completed dialogues
//! are generated on the blocking pool so slow PDFs never stall polling.

pub mod dialogue;
pub mod telegram;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::generate::{Generated, Personalizer};

pub use dialogue::{respond, Dialogue, Flow, Request, Turn};
pub use telegram::TelegramClient;

const FAILURE_PREFIX: &str = "Sorry, generating your PDF failed";

/// Run the bot until Ctrl+C. Fails early if the token is rejected.
///
/// Documents are generated into the bot's scratch directory and removed
/// once they have been sent.
pub async fn run(personalizer: Personalizer, token: &str) -> Result<()> {
    let settings = personalizer.config().bot.clone();
    let client = Arc::new(TelegramClient::new(&settings.api_base, token)?);
    let personalizer = Arc::new(Personalizer::new(personalizer.config().for_bot()));
    info!("Generating into {}", personalizer.config().bot_output_dir().display());

    let me = client.get_me().await?;
    info!(
        "Bot @{} is running",
        me.username.as_deref().unwrap_or("unknown")
    );

    let mut sessions: HashMap<i64, Dialogue> = HashMap::new();
    let mut offset: Option<i64> = None;

    loop {
        let updates = tokio::select! {
            updates = client.get_updates(offset, settings.poll_timeout_secs) => updates,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down ({} conversations open)", sessions.len());
                return Ok(());
            }
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Polling failed: {}; retrying in {}s", e, settings.retry_delay_secs);
                tokio::time::sleep(Duration::from_secs(settings.retry_delay_secs)).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };
            let chat_id = message.chat.id;

            let turn = respond(sessions.remove(&chat_id), &text);
            if let Some(next) = turn.next {
                sessions.insert(chat_id, next);
            }
            if let Some(reply) = turn.reply {
                if let Err(e) = client.send_message(chat_id, &reply).await {
                    warn!("Could not reply to chat {}: {}", chat_id, e);
                }
            }
            if let Some(request) = turn.request {
                tokio::spawn(fulfil(client.clone(), personalizer.clone(), chat_id, request));
            }
        }
    }
}

fn generate(personalizer: &Personalizer, request: &Request) -> Result<Generated> {
    match request {
        Request::Cover { name, college_id } => personalizer.generate_cover_page(name, college_id),
        Request::Report { name } => personalizer.generate_report(name),
    }
}

/// What the chat receives once a request has been processed
#[derive(Debug, Clone, PartialEq, Eq)]
enum Delivery {
    Document { path: PathBuf, file_name: String },
    Message(String),
}

fn delivery(outcome: Result<Generated>) -> Delivery {
    match outcome {
        Ok(generated) => Delivery::Document {
            path: generated.path,
            file_name: generated.file_name,
        },
        Err(e) => Delivery::Message(format!("{}: {}", FAILURE_PREFIX, e)),
    }
}

/// Generate one request and send the result (or the failure) to the chat
async fn fulfil(client: Arc<TelegramClient>, personalizer: Arc<Personalizer>, chat_id: i64, request: Request) {
    info!("Chat {}: generating {:?}", chat_id, request);

    let outcome = match tokio::task::spawn_blocking(move || generate(&personalizer, &request)).await {
        Ok(result) => result,
        Err(e) => Err(Error::General(format!("worker stopped: {}", e))),
    };

    match delivery(outcome) {
        Delivery::Document { path, file_name } => {
            if let Err(e) = client.send_document(chat_id, &path, &file_name).await {
                warn!("Chat {}: could not deliver {}: {}", chat_id, file_name, e);
            }
            // Sent or not, the file belongs to this request only
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
        Delivery::Message(reply) => {
            error!("Chat {}: {}", chat_id, reply);
            if let Err(e) = client.send_message(chat_id, &reply).await {
                warn!("Chat {}: could not deliver failure notice: {}", chat_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::generate::{Field, Placement};
    use crate::layout::{PlacementResult, Point};
    use std::path::Path;

    #[test]
    fn test_generate_dispatches_on_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.pdf_dir = dir.path().to_path_buf();
        config.font_path = None;
        let personalizer = Personalizer::new(config);

        let cover = Request::Cover {
            name: "Jane".to_string(),
            college_id: "ID".to_string(),
        };
        match generate(&personalizer, &cover) {
            Err(Error::TemplateNotFound(path)) => assert!(path.ends_with("Cover_Page.pdf")),
            other => panic!("unexpected result {:?}", other),
        }

        let report = Request::Report { name: "Jane".to_string() };
        match generate(&personalizer, &report) {
            Err(Error::TemplateNotFound(path)) => assert!(path.ends_with("HEYGION_HEALTH_REPORT.pdf")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_failed_generation_replies_with_reason() {
        let missing = Path::new("templates/Cover_Page.pdf");
        let reply = delivery(Err(Error::TemplateNotFound(missing.to_path_buf())));

        match reply {
            Delivery::Message(text) => {
                assert!(text.starts_with("Sorry, generating your PDF failed: "));
                assert!(text.contains("templates/Cover_Page.pdf"));
            }
            other => panic!("unexpected delivery {:?}", other),
        }
    }

    #[test]
    fn test_generated_document_is_sent_under_its_display_name() {
        let generated = Generated {
            path: PathBuf::from("/tmp/pdf-nameplate-bot/Cover_for_Jane (1).pdf"),
            file_name: "Cover_for_Jane.pdf".to_string(),
            placements: vec![Placement {
                page: 0,
                field: Field::Name,
                result: PlacementResult::Point(Point::new(100.0, 754.0)),
            }],
        };

        assert_eq!(
            delivery(Ok(generated)),
            Delivery::Document {
                path: PathBuf::from("/tmp/pdf-nameplate-bot/Cover_for_Jane (1).pdf"),
                file_name: "Cover_for_Jane.pdf".to_string(),
            }
        );
    }
}
