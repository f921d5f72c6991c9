//! The dice-roll command handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    base::types::{HandlerError, Reply},
    dice::{DiceExpression, RollSource},
    message::NewMessage,
};

/// Rolls dice notation found anywhere in the addressed text.
pub struct DiceHandler {
    rolls: Arc<dyn RollSource>,
}

impl DiceHandler {
    pub fn new(rolls: Arc<dyn RollSource>) -> Self {
        Self { rolls }
    }
}

#[async_trait]
impl crate::handler::MessageHandler for DiceHandler {
    fn name(&self) -> &'static str {
        "dice"
    }

    /// Pattern-based trigger: anything shaped like dice notation in
    /// `raw_text`. Shape only, so invalid rolls still reach `produce` and
    /// come back as a fallback.
    async fn is_triggered(&self, message: &NewMessage) -> bool {
        let Some(raw_text) = &message.raw_text else {
            return false;
        };

        DiceExpression::matches(raw_text)
    }

    async fn produce(&self, message: &NewMessage) -> Result<Reply, HandlerError> {
        let raw_text = message.raw_text.as_deref().unwrap_or_default();

        let expr = DiceExpression::parse(raw_text).map_err(|e| HandlerError::Fallback(e.to_string()))?;

        debug!("Rolling {expr} for user {}", message.from_id);

        let pool = self.rolls.pool(expr.count, expr.faces).await;
        let result = expr.evaluate(pool);

        Ok(Reply::Text(expr.render(&result)))
    }
}
