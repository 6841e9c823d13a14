//! Minimal Telegram Bot API client: just the calls the bot needs

use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Telegram(
                self.description.unwrap_or_else(|| "request failed without a description".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    /// Decode the envelope; the URL carries the token, so strip it from errors
    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| Error::Http(e.without_url()))?;
        let body: ApiResponse<T> = response.json().await.map_err(|e| Error::Http(e.without_url()))?;
        body.into_result()
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call(self.http.get(self.url("getMe"))).await
    }

    /// Long-poll for new messages after `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let request = self
            .http
            .post(self.url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&payload);
        self.call(request).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let payload = json!({ "chat_id": chat_id, "text": text });
        let _: Message = self.call(self.http.post(self.url("sendMessage")).json(&payload)).await?;
        Ok(())
    }

    /// Upload a PDF as a document
    pub async fn send_document(&self, chat_id: i64, path: &Path, file_name: &str) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        debug!("Uploading {} ({} bytes) to chat {}", file_name, bytes.len(), chat_id);

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().text("chat_id", chat_id.to_string()).part("document", part);

        let _: Message = self.call(self.http.post(self.url("sendDocument")).multipart(form)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_updates() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 41, "message": {"message_id": 7, "chat": {"id": -100, "type": "private"},
                 "date": 0, "text": "/start"}},
                {"update_id": 42, "edited_message": {"message_id": 7, "chat": {"id": -100}, "date": 0}}
            ]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let updates = response.into_result().unwrap();

        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_api_error_is_telegram_error() {
        let body = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<User> = serde_json::from_str(body).unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::Telegram(ref d) if d == "Unauthorized"));
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(client.url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
    }
}
