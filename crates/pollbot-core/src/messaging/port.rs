use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
}

/// A local file sent as a multipart part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    pub field: &'static str,
    pub path: PathBuf,
}

/// One Bot API method call, transport-neutral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: &'static str,
    pub verb: HttpVerb,
    pub params: Vec<(&'static str, String)>,
    pub upload: Option<FileUpload>,
}

impl ApiRequest {
    pub fn get(method: &'static str) -> Self {
        Self {
            method,
            verb: HttpVerb::Get,
            params: Vec::new(),
            upload: None,
        }
    }

    pub fn post(method: &'static str) -> Self {
        Self {
            verb: HttpVerb::Post,
            ..Self::get(method)
        }
    }

    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    pub fn param_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn upload(mut self, field: &'static str, path: impl Into<PathBuf>) -> Self {
        self.upload = Some(FileUpload {
            field,
            path: path.into(),
        });
        self
    }

    /// Value of the first parameter named `key`.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Hexagonal port for the Telegram Bot API.
///
/// Implementations return the decoded JSON body whatever its `ok` flag says;
/// only connection-level failures (and bodies that are not JSON) become
/// [`crate::Error::Transport`].
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn execute(&self, req: ApiRequest) -> Result<serde_json::Value>;
}
