//! Nutrition/query advisor backed by a text-generation service (Gemini).
//!
//! The model is asked for strict JSON but routinely wraps it in markdown
//! fences or pads it with prose, so responses are salvaged with
//! [`extract_json`] and malformed nutrition answers degrade to zeroed values.

use anyhow::Context;
use axum::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutritionInfo {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub is_veg: bool,
}

/// Minimal meal view handed to the query advisor.
#[derive(Debug, Clone, Serialize)]
pub struct MealSummary {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub food_items: Vec<String>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub is_veg: bool,
}

#[async_trait]
pub trait NutritionAdvisor: Send + Sync {
    /// Estimate calories/protein/veg for one free-text food-item name.
    async fn analyze(&self, food_item: &str) -> anyhow::Result<NutritionInfo>;

    /// Answer a natural-language question against the candidate meals,
    /// returning the ids judged relevant.
    async fn relevant_meals(
        &self,
        question: &str,
        meals: &[MealSummary],
    ) -> anyhow::Result<Vec<Uuid>>;
}

#[derive(Clone)]
pub struct GeminiAdvisor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiAdvisor {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        // Bounded wait: a slow model must not hold up listing creation.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build advisor http client")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/v1beta/models/gemini-pro:generateContent?key={}",
            self.base_url, self.api_key
        );
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("gemini request")?;
        if !resp.status().is_success() {
            anyhow::bail!("gemini responded with status {}", resp.status());
        }
        let payload: serde_json::Value = resp.json().await.context("gemini body")?;
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("gemini response had no text part"))?;
        Ok(text.to_string())
    }
}

#[async_trait]
impl NutritionAdvisor for GeminiAdvisor {
    async fn analyze(&self, food_item: &str) -> anyhow::Result<NutritionInfo> {
        let prompt = format!(
            "Estimate the nutrition of the following food item.\n\
             Food item: {food_item}\n\
             Respond with JSON only, exactly this shape:\n\
             {{\"calories\": <number>, \"protein\": <grams as number>, \"is_veg\": <boolean>}}"
        );
        let text = self.generate(&prompt).await?;
        match extract_json::<NutritionInfo>(&text) {
            Some(info) => Ok(info),
            None => {
                warn!(food_item, "unusable nutrition answer, falling back to zeroed values");
                Ok(NutritionInfo::default())
            }
        }
    }

    async fn relevant_meals(
        &self,
        question: &str,
        meals: &[MealSummary],
    ) -> anyhow::Result<Vec<Uuid>> {
        let prompt = format!(
            "Given these meals and a user question, return the ids of the meals \
             that best answer the question.\n\
             Question: \"{question}\"\n\
             Meals:\n{}\n\
             Respond with a JSON array of meal id strings only.",
            serde_json::to_string_pretty(meals)?
        );
        let text = self.generate(&prompt).await?;
        let ids: Vec<Uuid> = extract_json(&text)
            .ok_or_else(|| anyhow::anyhow!("query advisor returned no usable id list"))?;
        Ok(ids)
    }
}

/// Pull the first JSON value out of a model answer, tolerating ```json fences
/// and surrounding prose.
pub fn extract_json<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Some(v);
    }
    let start = trimmed.find(['{', '['])?;
    let close = match trimmed.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let info: NutritionInfo =
            extract_json(r#"{"calories": 220, "protein": 8.5, "is_veg": true}"#).unwrap();
        assert_eq!(info.calories, 220.0);
        assert_eq!(info.protein, 8.5);
        assert!(info.is_veg);
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let text = "Sure! Here you go:\n```json\n{\"calories\": 90, \"protein\": 2, \"is_veg\": false}\n```\nEnjoy.";
        let info: NutritionInfo = extract_json(text).unwrap();
        assert_eq!(info.calories, 90.0);
        assert!(!info.is_veg);
    }

    #[test]
    fn parses_id_array() {
        let id = Uuid::new_v4();
        let text = format!("```json\n[\"{id}\"]\n```");
        let ids: Vec<Uuid> = extract_json(&text).unwrap();
        assert_eq!(ids, vec![id]);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let info: NutritionInfo = extract_json(r#"{"calories": 150}"#).unwrap();
        assert_eq!(info.protein, 0.0);
        assert!(!info.is_veg);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(extract_json::<NutritionInfo>("I cannot answer that.").is_none());
        assert!(extract_json::<NutritionInfo>("{not json}").is_none());
    }
}
