//! Telegram Bot API adapter over reqwest.
//!
//! Implements the `pollbot-core` [`BotApi`] port. Bodies are returned as
//! decoded JSON whatever the HTTP status, so `ok: false` replies reach the
//! caller intact; only connection failures and non-JSON bodies are errors.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use pollbot_core::{
    config::Config,
    errors::Error,
    messaging::port::{ApiRequest, BotApi, FileUpload, HttpVerb},
    Result,
};

#[derive(Clone)]
pub struct HttpBotApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpBotApi {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|e| Error::Transport(format!("http client setup failed: {e}")))?;
        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            token: cfg.telegram_bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    // The URL embeds the token; strip it from anything that may be logged.
    fn map_err(method: &str, e: reqwest::Error) -> Error {
        Error::Transport(format!("{method}: {}", e.without_url()))
    }

    async fn multipart(params: Vec<(&'static str, String)>, upload: &FileUpload) -> Result<Form> {
        let bytes = tokio::fs::read(&upload.path).await?;
        let file_name = upload
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| upload.field.to_string());

        let form = params
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value));
        Ok(form.part(upload.field, Part::bytes(bytes).file_name(file_name)))
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn execute(&self, req: ApiRequest) -> Result<Value> {
        let ApiRequest {
            method,
            verb,
            params,
            upload,
        } = req;
        let url = self.method_url(method);
        tracing::debug!(method, ?verb, "bot api call");

        let builder = match (verb, upload) {
            (HttpVerb::Get, None) => self.http.get(url).query(&params),
            (HttpVerb::Post, None) => self.http.post(url).form(&params),
            (_, Some(upload)) => {
                tracing::debug!(method, file = %display_path(&upload.path), "uploading file");
                self.http
                    .post(url)
                    .multipart(Self::multipart(params, &upload).await?)
            }
        };

        let resp = builder.send().await.map_err(|e| Self::map_err(method, e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| Self::map_err(method, e))?;

        serde_json::from_slice(&body).map_err(|e| {
            Error::Transport(format!(
                "{method}: unreadable response (HTTP {status}): {e}"
            ))
        })
    }
}

fn display_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
