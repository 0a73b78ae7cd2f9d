//! Payment processor client
//!
//! Only two calls are needed: create an intent whose client secret the
//! browser confirms, and retrieve an intent to check it really succeeded
//! before a paid booking is written.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Intent status once the processor has captured the funds
pub const SUCCEEDED: &str = "succeeded";

/// Payment intent as reported by the processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Smallest currency unit
    pub amount: i64,
    pub currency: String,
    pub status: String,
    /// Key/value pairs attached when the intent was created
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == SUCCEEDED
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent>;

    /// `None` when the processor does not know the id
    async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>>;
}

/// Stripe REST API client
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

impl StripeGateway {
    pub fn new(base_url: impl Into<String>, secret_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.filter(|k| !k.is_empty()),
        }
    }

    fn secret_key(&self) -> Result<&str> {
        match &self.secret_key {
            Some(key) => Ok(key),
            None => bail!("payment processor is not configured"),
        }
    }

    /// `{base_url}/v1/payment_intents/{id}` with `id` encoded as one path segment
    fn intent_url(&self, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid payment processor url {}", self.base_url))?
            .pop_if_empty()
            .extend(["v1", "payment_intents", id]);
        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent> {
        let mut form = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(
            metadata
                .iter()
                .map(|(key, value)| (format!("metadata[{}]", key), value.clone())),
        );

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(self.secret_key()?)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("payment intent creation failed ({}): {}", status, body);
        }

        let intent: PaymentIntent = response.json().await?;
        info!("Created payment intent {} for {} {}", intent.id, amount, currency);
        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>> {
        let secret_key = self.secret_key()?;
        let response = self
            .client
            .get(self.intent_url(id)?)
            .bearer_auth(secret_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Payment intent {} not found", id);
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                bail!("payment intent lookup failed ({}): {}", status, body)
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Gateway holding intents in memory
    #[derive(Default)]
    pub struct FakeGateway {
        intents: Mutex<HashMap<String, PaymentIntent>>,
        aliases: Mutex<HashMap<String, String>>,
    }

    impl FakeGateway {
        /// Register an intent opened for `session_id` in the given state
        pub fn add(&self, session_id: Uuid, id: &str, amount: i64, currency: &str, status: &str) {
            let metadata = HashMap::from([("session_id".to_string(), session_id.to_string())]);
            self.insert(id, amount, currency, status, metadata);
        }

        /// Answer lookups of `reference` with the intent stored under `id`
        pub fn alias(&self, reference: &str, id: &str) {
            self.aliases
                .lock()
                .unwrap()
                .insert(reference.to_string(), id.to_string());
        }

        fn insert(
            &self,
            id: &str,
            amount: i64,
            currency: &str,
            status: &str,
            metadata: HashMap<String, String>,
        ) {
            let intent = PaymentIntent {
                id: id.to_string(),
                client_secret: Some(format!("{}_secret", id)),
                amount,
                currency: currency.to_string(),
                status: status.to_string(),
                metadata,
            };
            self.intents.lock().unwrap().insert(id.to_string(), intent);
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_intent(
            &self,
            amount: i64,
            currency: &str,
            metadata: &[(&str, String)],
        ) -> Result<PaymentIntent> {
            let id = format!("pi_{}", self.intents.lock().unwrap().len() + 1);
            let metadata = metadata
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect();
            self.insert(&id, amount, currency, "requires_payment_method", metadata);
            Ok(self.intents.lock().unwrap()[&id].clone())
        }

        async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>> {
            let id = self
                .aliases
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_else(|| id.to_string());
            Ok(self.intents.lock().unwrap().get(&id).cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_gateway_fails_without_network() {
        let gateway = StripeGateway::new("http://127.0.0.1:1/", Some(String::new()));

        let err = gateway.retrieve_intent("pi_123").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn test_intent_parses_processor_payload() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{"id":"pi_1","object":"payment_intent","amount":1500,"currency":"usd","status":"succeeded","client_secret":"pi_1_secret_x"}"#,
        )
        .unwrap();

        assert!(intent.is_succeeded());
        assert_eq!(intent.amount, 1500);
        assert!(intent.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_intent_id_is_sent_as_one_path_segment() {
        use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};

        async fn lookup(Path(id): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
            if id != "pi_abc" {
                return Err(StatusCode::NOT_FOUND);
            }
            Ok(Json(serde_json::json!({
                "id": "pi_abc",
                "amount": 1500,
                "currency": "usd",
                "status": "succeeded",
                "metadata": {"session_id": "s1"}
            })))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new().route("/v1/payment_intents/:id", get(lookup));
        tokio::spawn(async move { axum::serve(listener, app).await });

        let gateway = StripeGateway::new(format!("http://{}/", address), Some("sk_test".into()));

        let intent = gateway.retrieve_intent("pi_abc").await.unwrap().unwrap();
        assert_eq!(intent.id, "pi_abc");
        assert_eq!(intent.metadata["session_id"], "s1");

        for suffixed in ["pi_abc#again", "pi_abc?again", "pi_abc/again"] {
            assert_eq!(gateway.retrieve_intent(suffixed).await.unwrap(), None, "{}", suffixed);
        }
    }
}
