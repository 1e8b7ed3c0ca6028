//! Outbound collaborators: the signedup marketplace, its executor calendar
//! and the SMS gateway.
//!
//! The marketplace is an opaque HTTP service. Calls return the raw status
//! and body; workflows decide what a given status means.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use terminal_core::{OrderId, ServiceId};
use terminal_orders::OrderStatus;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("marketplace request failed: {0}")]
    Transport(String),

    #[error("sms delivery failed: {0}")]
    Sms(String),
}

impl From<reqwest::Error> for MarketplaceError {
    fn from(value: reqwest::Error) -> Self {
        MarketplaceError::Transport(value.to_string())
    }
}

/// Raw marketplace reply.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceResponse {
    pub status: u16,
    /// Parsed JSON body, `Null` when the body is not JSON.
    pub body: Value,
    pub text: String,
}

impl MarketplaceResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, body, text }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            text: body.to_string(),
            body,
        }
    }

    /// `error` field of the body, falling back to the raw text.
    pub fn error_message(&self) -> String {
        match self.body.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => self.text.clone(),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        match self.body.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty() && s != "0" && s != "false",
            _ => false,
        }
    }

    /// A string or numeric body field rendered as text.
    pub fn field_str(&self, key: &str) -> Option<String> {
        match self.body.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn field_u64(&self, key: &str) -> Option<u64> {
        match self.body.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Task operations of the marketplace.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Create a task for an order. Success is `201` with the task id in `id`.
    async fn publish_task(&self, payload: &Value) -> Result<MarketplaceResponse, MarketplaceError>;

    /// Set the status of the task of `order_id`. Success is `200`.
    async fn change_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<MarketplaceResponse, MarketplaceError>;

    /// Hand the task of `order_id` to the executor with this phone. Success
    /// is `200` with `executor_id` and `executor_fio`.
    async fn assign_executor(
        &self,
        order_id: OrderId,
        executor_phone: &str,
    ) -> Result<MarketplaceResponse, MarketplaceError>;
}

/// Executor availability for requested dates.
#[async_trait]
pub trait SlotCalendar: Send + Sync {
    async fn slots_available(
        &self,
        dates: &[NaiveDate],
        services: &[ServiceId],
        city_id: u64,
    ) -> Result<bool, MarketplaceError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), MarketplaceError>;
}

/// SMS sender that only records the message in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
    async fn send(&self, phone: &str, text: &str) -> Result<(), MarketplaceError> {
        tracing::info!(phone, text, "sms queued");
        Ok(())
    }
}

/// HTTP client of the signedup API.
#[derive(Debug, Clone)]
pub struct SignedupClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SignedupClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.signedup_api_site, &config.terminal_api_key)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    async fn post(&self, path: &str, body: &Value) -> Result<MarketplaceResponse, MarketplaceError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        Ok(MarketplaceResponse::new(status, text))
    }
}

#[async_trait]
impl Marketplace for SignedupClient {
    #[instrument(skip(self, payload), err)]
    async fn publish_task(&self, payload: &Value) -> Result<MarketplaceResponse, MarketplaceError> {
        self.post("api/tasks/task/", payload).await
    }

    #[instrument(skip(self), err)]
    async fn change_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<MarketplaceResponse, MarketplaceError> {
        let body = json!({
            "signedup_account_api_key": self.api_key,
            "order_id": order_id,
            "status_id": status.code(),
        });
        self.post("api/specialtasks/status/", &body).await
    }

    #[instrument(skip(self), err)]
    async fn assign_executor(
        &self,
        order_id: OrderId,
        executor_phone: &str,
    ) -> Result<MarketplaceResponse, MarketplaceError> {
        let body = json!({
            "signedup_account_api_key": self.api_key,
            "order_id": order_id,
            "executor_phone": executor_phone,
        });
        self.post("api/specialtasks/executor-assign/", &body).await
    }
}

#[async_trait]
impl SlotCalendar for SignedupClient {
    #[instrument(skip(self), err)]
    async fn slots_available(
        &self,
        dates: &[NaiveDate],
        services: &[ServiceId],
        city_id: u64,
    ) -> Result<bool, MarketplaceError> {
        let body = json!({
            "signedup_account_api_key": self.api_key,
            "dates": dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
            "services": services,
            "city_id": city_id,
        });
        let resp = self.post("api/schedule/check-slots/", &body).await?;
        if resp.status != 200 {
            return Err(MarketplaceError::Transport(format!(
                "slot check returned {}: {}",
                resp.status,
                resp.error_message()
            )));
        }
        Ok(resp.flag("available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_error_field() {
        let r = MarketplaceResponse::json(500, json!({"error": "task is closed"}));
        assert_eq!(r.error_message(), "task is closed");

        let r = MarketplaceResponse::new(502, "Bad Gateway");
        assert_eq!(r.body, Value::Null);
        assert_eq!(r.error_message(), "Bad Gateway");
    }

    #[test]
    fn flags_accept_loose_truthiness() {
        assert!(MarketplaceResponse::json(400, json!({"already_exist": true})).flag("already_exist"));
        assert!(MarketplaceResponse::json(400, json!({"already_exist": 1})).flag("already_exist"));
        assert!(!MarketplaceResponse::json(400, json!({"already_exist": "false"})).flag("already_exist"));
        assert!(!MarketplaceResponse::new(400, "oops").flag("already_exist"));
    }

    #[test]
    fn ids_read_from_numbers_or_strings() {
        let r = MarketplaceResponse::json(200, json!({"executor_id": "17", "id": 99}));
        assert_eq!(r.field_u64("executor_id"), Some(17));
        assert_eq!(r.field_str("id").as_deref(), Some("99"));
        assert_eq!(r.field_u64("missing"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let c = SignedupClient::new("https://signedup.example", "key");
        assert_eq!(c.base_url, "https://signedup.example/");
        assert_eq!(c.api_key(), "key");
    }
}
