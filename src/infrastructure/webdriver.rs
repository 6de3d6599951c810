//! `BrowserPage` over a W3C WebDriver session
//!
//! Targets chromedriver: registering a script for future navigations goes
//! through the vendor CDP passthrough, since WebDriver classic has no
//! equivalent. Everything else is standard WebDriver.

use async_trait::async_trait;
use http::{Method, Uri};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::http::{HttpError, JsonHttpClient};
use super::log_messages::transport as messages;
use crate::application::ports::{BrowserError, BrowserPage};
use crate::config::BrowserSettings;

/// Key under which WebDriver returns an element reference
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// An existing WebDriver session, driven over HTTP
pub struct WebDriverPage {
    base_url: String,
    session_id: String,
    http: JsonHttpClient,
    timeout: Duration,
}

impl WebDriverPage {
    pub fn new(base_url: &str, session_id: &str, timeout: Duration) -> Result<Self, BrowserError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        JsonHttpClient::parse_uri(&base_url)
            .map_err(|e| BrowserError::InvalidResponse(e.to_string()))?;
        Ok(Self {
            base_url,
            session_id: session_id.to_string(),
            http: JsonHttpClient::new(timeout),
            timeout,
        })
    }

    /// `None` when no session id is configured
    pub fn from_settings(settings: &BrowserSettings) -> Option<Result<Self, BrowserError>> {
        let session_id = settings.session_id.as_deref()?;
        Some(Self::new(
            &settings.webdriver_url,
            session_id,
            Duration::from_millis(settings.request_timeout_ms),
        ))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn session_uri(&self, path: &str) -> Result<Uri, BrowserError> {
        let url = format!(
            "{}/session/{}{}",
            self.base_url,
            urlencoding::encode(&self.session_id),
            path
        );
        JsonHttpClient::parse_uri(&url).map_err(|e| BrowserError::InvalidResponse(e.to_string()))
    }

    /// POST `body` to a session endpoint and unwrap the `value` member
    async fn command(&self, path: &str, body: Value) -> Result<Value, BrowserError> {
        let uri = self.session_uri(path)?;
        debug!(path, "{}", messages::WEBDRIVER_COMMAND);

        let response = self
            .http
            .send(Method::POST, uri, Some(&body))
            .await
            .map_err(transport_error)?;

        let mut body = response.body;
        let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if response.status.is_success() {
            return Ok(value);
        }

        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        warn!(path, status = response.status.as_u16(), error = %error, "{}", messages::WEBDRIVER_ERROR);

        Err(match error.as_str() {
            "invalid session id" | "no such window" | "session not created" => {
                BrowserError::Disconnected(message)
            }
            "no such element" | "stale element reference" => BrowserError::ElementNotFound(message),
            "javascript error" => BrowserError::ScriptFailed(message),
            "timeout" | "script timeout" => BrowserError::Timeout(self.timeout),
            _ => BrowserError::InvalidResponse(format!("{error}: {message}")),
        })
    }
}

#[async_trait]
impl BrowserPage for WebDriverPage {
    async fn add_init_script(&self, source: &str) -> Result<(), BrowserError> {
        self.command(
            "/goog/cdp/execute",
            json!({
                "cmd": "Page.addScriptToEvaluateOnNewDocument",
                "params": { "source": source },
            }),
        )
        .await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        self.command("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn click_button(&self, name: &str) -> Result<(), BrowserError> {
        let element = self
            .command(
                "/element",
                json!({ "using": "xpath", "value": button_xpath(name) }),
            )
            .await
            .map_err(|error| match error {
                BrowserError::ElementNotFound(_) => {
                    BrowserError::ElementNotFound(format!("button {name:?}"))
                }
                other => other,
            })?;

        let element_id = element
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::InvalidResponse(format!("no element reference in {element}")))?;

        self.command(
            &format!("/element/{}/click", urlencoding::encode(element_id)),
            json!({}),
        )
        .await?;
        Ok(())
    }
}

fn transport_error(error: HttpError) -> BrowserError {
    match error {
        HttpError::Timeout(waited) => BrowserError::Timeout(waited),
        HttpError::Connection(reason) => BrowserError::Disconnected(reason),
        other => BrowserError::InvalidResponse(other.to_string()),
    }
}

/// XPath for a button by visible text or accessible label
fn button_xpath(name: &str) -> String {
    let literal = xpath_literal(name);
    format!("//button[normalize-space(.)={literal} or @aria-label={literal}]")
}

/// Quote `text` as an XPath 1.0 string literal, which has no escapes
fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        format!("\"{text}\"")
    } else if !text.contains('\'') {
        format!("'{text}'")
    } else {
        let parts: Vec<String> = text
            .split('"')
            .map(|part| format!("\"{part}\""))
            .collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}
