// Support ticket submission over a JSON webhook.

use crate::config::NotifierConfig;
use crate::error::DiagError;
use crate::models::SupportTicket;
use crate::version;
use std::time::Duration;
use tracing::{info, instrument};

pub enum Notifier {
    Disabled,
    Webhook { client: reqwest::Client, url: String },
}

impl Notifier {
    pub fn from_config(config: &NotifierConfig) -> anyhow::Result<Self> {
        let Some(url) = &config.webhook_url else {
            return Ok(Notifier::Disabled);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(version::user_agent())
            .build()?;
        Ok(Notifier::Webhook {
            client,
            url: url.clone(),
        })
    }

    /// Transport errors come back verbatim; callers surface them to the user.
    #[instrument(skip(self, ticket), fields(operation = "submit_ticket", subject = %ticket.subject))]
    pub async fn submit(&self, ticket: &SupportTicket) -> Result<(), DiagError> {
        match self {
            Notifier::Disabled => Err(DiagError::Transport(
                "no ticket webhook configured".into(),
            )),
            Notifier::Webhook { client, url } => {
                client
                    .post(url)
                    .json(ticket)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| DiagError::Transport(e.to_string()))?;
                info!("ticket submitted");
                Ok(())
            }
        }
    }
}
