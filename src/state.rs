use crate::advisor::{GeminiAdvisor, NutritionAdvisor};
use crate::config::AppConfig;
use crate::identity::{GoogleIdentity, IdentityProvider};
use crate::mailer::{EmailJsMailer, Mailer};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityProvider>,
    pub advisor: Arc<dyn NutritionAdvisor>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        let identity =
            Arc::new(GoogleIdentity::new(&config.tokeninfo_url)?) as Arc<dyn IdentityProvider>;
        let advisor = Arc::new(GeminiAdvisor::new(
            &config.gemini_base_url,
            &config.gemini_api_key,
        )?) as Arc<dyn NutritionAdvisor>;
        let mailer = Arc::new(EmailJsMailer::new(config.email.clone())?) as Arc<dyn Mailer>;

        Ok(Self {
            db,
            config,
            identity,
            advisor,
            mailer,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::advisor::{MealSummary, NutritionInfo};
        use crate::identity::Identity;
        use axum::async_trait;
        use uuid::Uuid;

        struct FakeIdentity;
        #[async_trait]
        impl IdentityProvider for FakeIdentity {
            async fn resolve(&self, id_token: &str) -> anyhow::Result<Identity> {
                Ok(Identity {
                    subject: format!("sub-{id_token}"),
                    email: "student@test.edu".into(),
                })
            }
        }

        struct FakeAdvisor;
        #[async_trait]
        impl NutritionAdvisor for FakeAdvisor {
            async fn analyze(&self, _food_item: &str) -> anyhow::Result<NutritionInfo> {
                Ok(NutritionInfo::default())
            }
            async fn relevant_meals(
                &self,
                _question: &str,
                meals: &[MealSummary],
            ) -> anyhow::Result<Vec<Uuid>> {
                Ok(meals.iter().map(|m| m.id).collect())
            }
        }

        struct FakeMailer;
        #[async_trait]
        impl Mailer for FakeMailer {
            async fn send(&self, _template_id: &str, _params: &serde_json::Value) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let config = Arc::new(AppConfig::fake());
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool ok");

        Self {
            db,
            config,
            identity: Arc::new(FakeIdentity),
            advisor: Arc::new(FakeAdvisor),
            mailer: Arc::new(FakeMailer),
        }
    }
}
