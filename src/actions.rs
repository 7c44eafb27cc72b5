//! Hosting action surface
//!
//! `GET_YIELD_STRATEGY` answers "what is the current strategy for tier X"
//! from the strategy store. Parameters are validated once at this boundary;
//! every outcome, including failures, renders as response text.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::store::StrategyStore;
use crate::strategy::RiskTier;

pub const GET_YIELD_STRATEGY: &str = "GET_YIELD_STRATEGY";


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetStrategyRequest {
    pub risk: RiskTier,
}

impl GetStrategyRequest {
    /// Validate raw action parameters, e.g. `{"risk": "low"}`
    pub fn from_params(params: &Value) -> Result<Self> {
        let risk = match params.get("risk") {
            Some(Value::String(s)) => match s.as_str() {
                "low" => RiskTier::Low,
                "high" => RiskTier::High,
                _ => return Err(invalid_risk(s)),
            },
            Some(other) => return Err(invalid_risk(&other.to_string())),
            None => return Err(invalid_risk("undefined")),
        };
        Ok(Self { risk })
    }
}

fn invalid_risk(received: &str) -> Error {
    Error::InvalidRequest {
        field: "risk".to_string(),
        message: format!("Risk level must be 'low' or 'high'. Received: {}", received),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub text: String,
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ActionResponse {
    fn new(text: String, source: Option<String>) -> Self {
        Self {
            text,
            actions: vec![GET_YIELD_STRATEGY.to_string()],
            source,
        }
    }
}

/// Look up the stored decision for the requested tier
pub async fn get_yield_strategy(
    store: &StrategyStore,
    request: GetStrategyRequest,
    source: Option<String>,
) -> Result<ActionResponse> {
    let risk = request.risk;
    let text = match store.get(risk).await? {
        Some(decision) => {
            info!("Retrieved {}-risk strategy", risk);
            format!(
                "Here is the current {}-risk yield strategy:\n```json\n{}\n```",
                risk,
                serde_json::to_string_pretty(&decision)?
            )
        }
        None => {
            warn!("No {}-risk strategy in store", risk);
            format!(
                "I could not find a {}-risk yield strategy at the moment. The data might not have \
                 been calculated yet or there was an issue. Please try again later.",
                risk
            )
        }
    };
    Ok(ActionResponse::new(text, source))
}

/// Full action: validate, look up, and render failures as text
pub async fn respond(store: &StrategyStore, params: &Value, source: Option<String>) -> ActionResponse {
    info!("Handling {} action", GET_YIELD_STRATEGY);

    let result = match GetStrategyRequest::from_params(params) {
        Ok(request) => get_yield_strategy(store, request, source.clone()).await,
        Err(e) => Err(e),
    };

    result.unwrap_or_else(|e| {
        error!("{} failed: {}", GET_YIELD_STRATEGY, e);
        let message = match e {
            Error::InvalidRequest { message, .. } => message,
            other => other.to_string(),
        };
        ActionResponse::new(
            format!(
                "An error occurred while fetching the yield strategy: {}. Please check the server \
                 logs for details.",
                message
            ),
            source,
        )
    })
}
