//! Mailchimp newsletter adapter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::NewsletterProvider;
use crate::config::NewsletterConfig;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "mailchimp";

#[derive(Debug, Deserialize)]
struct BatchError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    errors: Vec<BatchError>,
}

/// Upserts subscribers through the list batch endpoint with
/// `update_existing`, so subscribing twice is harmless.
pub struct MailchimpNewsletter {
    transport: HttpTransport,
    config: NewsletterConfig,
}

impl MailchimpNewsletter {
    pub fn new(transport: HttpTransport, config: NewsletterConfig) -> Self {
        Self { transport, config }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.config.api_key.as_deref(), self.config.list_id.as_deref()) {
            (Some(key), Some(list)) => Ok((key, list)),
            _ => Err(Error::configuration_with_context(
                "newsletter API key or list id is not configured",
                ErrorContext::new()
                    .with_field_path("MAILCHIMP_API_KEY, MAILCHIMP_LIST_ID")
                    .with_source(SOURCE),
            )),
        }
    }

    fn base_url(&self, api_key: &str) -> Result<String> {
        if let Some(ref url) = self.config.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        datacenter_url(api_key)
    }
}

/// Keys look like `<hex>-us21`; the suffix names the datacenter.
pub(crate) fn datacenter_url(api_key: &str) -> Result<String> {
    match api_key.rsplit_once('-') {
        Some((_, dc)) if !dc.is_empty() && dc.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Ok(format!("https://{}.api.mailchimp.com/3.0", dc))
        }
        _ => Err(Error::configuration_with_context(
            "newsletter API key has no datacenter suffix",
            ErrorContext::new()
                .with_field_path("MAILCHIMP_API_KEY")
                .with_source(SOURCE),
        )),
    }
}

#[async_trait]
impl NewsletterProvider for MailchimpNewsletter {
    async fn upsert_subscriber(&self, email: &str) -> Result<()> {
        let (key, list) = self.credentials()?;
        let url = format!("{}/lists/{}", self.base_url(key)?, list);
        let body = json!({
            "members": [{ "email_address": email, "status": "subscribed" }],
            "update_existing": true,
        });
        let request = self
            .transport
            .client()
            .post(url)
            .basic_auth("weather-poetry", Some(key))
            .json(&body);
        let response: BatchResponse = self.transport.send_json(SOURCE, request).await?;
        if let Some(first) = response.errors.first() {
            error!(code = %first.error_code, detail = %first.error, "subscriber rejected");
            return Err(Error::Upstream {
                status: 400,
                message: format!("{} rejected subscriber: {}", SOURCE, first.error_code),
                retryable: false,
            });
        }
        info!("subscriber upserted");
        Ok(())
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
