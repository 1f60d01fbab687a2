//! Transactional email dispatch (EmailJS-style REST API).

use anyhow::Context;
use axum::async_trait;
use serde_json::{json, Value};
use time::{macros::format_description, OffsetDateTime};

use crate::config::EmailConfig;

pub const FROM_NAME: &str = "Pothichor";

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one templated email. Non-2xx delivery status is a failure.
    async fn send(&self, template_id: &str, params: &Value) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct EmailJsMailer {
    client: reqwest::Client,
    config: EmailConfig,
}

impl EmailJsMailer {
    pub fn new(config: EmailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build mailer http client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for EmailJsMailer {
    async fn send(&self, template_id: &str, params: &Value) -> anyhow::Result<()> {
        let url = format!("{}/api/v1.0/email/send", self.config.base_url);
        let body = json!({
            "service_id": self.config.service_id,
            "template_id": template_id,
            "user_id": self.config.public_key,
            "template_params": params,
        });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("email send request")?;
        if !resp.status().is_success() {
            anyhow::bail!("email service responded with status {}", resp.status());
        }
        Ok(())
    }
}

pub fn format_pickup(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
    at.format(&fmt).unwrap_or_else(|_| at.to_string())
}

/// Template parameters for the order-confirmation email.
pub fn confirmation_params(
    to_email: &str,
    title: &str,
    price: f64,
    pickup_time: OffsetDateTime,
    food_items: &[String],
) -> Value {
    let pickup = format_pickup(pickup_time);
    json!({
        "to_email": to_email,
        "meal_title": title,
        "pickup_time": pickup,
        "price": format!("Rs. {price}"),
        "food_items": food_items.join(", "),
        "from_name": FROM_NAME,
        "message": format!(
            "Your order for {title} has been confirmed! Please pick up your meal at {pickup}."
        ),
    })
}

/// Template parameters for the pickup-reminder email.
pub fn reminder_params(
    to_email: &str,
    title: &str,
    pickup_time: OffsetDateTime,
    food_items: &[String],
) -> Value {
    let pickup = format_pickup(pickup_time);
    json!({
        "to_email": to_email,
        "meal_title": title,
        "pickup_time": pickup,
        "food_items": food_items.join(", "),
        "from_name": FROM_NAME,
        "message": format!(
            "Your meal \"{title}\" is ready for pickup in 15 minutes! \
             Please pick up your meal at {pickup}."
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn confirmation_params_carry_price_and_items() {
        let params = confirmation_params(
            "a@b.edu",
            "Fish Curry Meals",
            80.0,
            datetime!(2026-09-01 12:30 UTC),
            &["rice".into(), "fish curry".into()],
        );
        assert_eq!(params["to_email"], "a@b.edu");
        assert_eq!(params["price"], "Rs. 80");
        assert_eq!(params["food_items"], "rice, fish curry");
        assert_eq!(params["from_name"], FROM_NAME);
        assert!(params["message"]
            .as_str()
            .unwrap()
            .contains("2026-09-01 12:30"));
    }

    #[test]
    fn reminder_params_mention_the_lead_time() {
        let params = reminder_params(
            "a@b.edu",
            "Veg Thali",
            datetime!(2026-09-01 12:30 UTC),
            &["rice".into()],
        );
        assert!(params["message"].as_str().unwrap().contains("15 minutes"));
    }
}
