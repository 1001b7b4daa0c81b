use crate::domain::gateway::{InitiatePayment, Initiation, PaymentMetadata, Verification};
use crate::domain::ports::PaymentGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub currency: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: String::new(),
            currency: "GHS".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Every Paystack response wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct MobileMoney<'a> {
    phone: &'a str,
    provider: &'a str,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: u64,
    currency: &'a str,
    callback_url: &'a str,
    metadata: &'a PaymentMetadata,
    mobile_money: MobileMoney<'a>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    #[serde(default)]
    gateway_response: Option<String>,
}

/// Payment gateway adapter for the Paystack transaction API.
#[derive(Debug, Clone)]
pub struct PaystackGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl PaystackGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        Ok(Self { config, http })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|error| {
            GatewayError::Transport(format!("invalid gateway URL {}: {error}", self.config.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Transport(format!("gateway URL {} cannot take a path", self.config.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.config.secret_key)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        let envelope = serde_json::from_slice::<Envelope<T>>(&body);

        match envelope {
            Ok(Envelope {
                status: true,
                data: Some(data),
                ..
            }) if status.is_success() => Ok(data),
            Ok(envelope) => {
                warn!(http_status = status.as_u16(), message = %envelope.message, "gateway rejected request");
                Err(GatewayError::Rejected {
                    message: envelope.message,
                })
            }
            Err(_) if !status.is_success() => Err(GatewayError::Rejected {
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&body)
                ),
            }),
            Err(error) => Err(GatewayError::Parse(error.to_string())),
        }
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(error.to_string())
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initiate(&self, request: InitiatePayment) -> Result<Initiation, GatewayError> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount_minor,
            currency: &self.config.currency,
            callback_url: &request.callback_url,
            metadata: &request.metadata,
            mobile_money: MobileMoney {
                phone: &request.phone,
                provider: request.channel.as_str(),
            },
        };
        debug!(amount = request.amount_minor, channel = %request.channel, "initializing transaction");

        let data: InitializeData = self
            .send(
                self.http
                    .post(self.endpoint(&["transaction", "initialize"])?)
                    .json(&body),
            )
            .await?;
        Ok(Initiation {
            reference: data.reference,
            authorization_url: data.authorization_url,
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let data: VerifyData = self
            .send(
                self.http
                    .get(self.endpoint(&["transaction", "verify", reference])?),
            )
            .await?;
        Ok(Verification::from_status(data.status, data.gateway_response))
    }
}
