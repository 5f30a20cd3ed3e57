use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::errors::FetchError;
use crate::models::{Category, CategoryEnvelope, Meal, MealEnvelope, ServiceConfig};

/// Source of meal data. Implemented over HTTP in production and by
/// scripted fakes in tests.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// One random meal, or `None` when the API had nothing to give
    async fn fetch_random(&self) -> Result<Option<Meal>, FetchError>;

    async fn search(&self, query: &str) -> Result<Vec<Meal>, FetchError>;

    async fn by_category(&self, name: &str) -> Result<Vec<Meal>, FetchError>;

    async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError>;
}

/// TheMealDB JSON API client
pub struct MealDbClient {
    base_url: String,
    client: Client,
}

impl MealDbClient {
    /// Fails when the HTTP client cannot be built with the configured
    /// timeout (e.g. the TLS backend does not initialise)
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base_url: normalize_base(&config.api_base),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        serde_json::from_str(&body).map_err(|source| FetchError::Decode { endpoint, source })
    }
}

/// Endpoints are joined by plain concatenation, so the base needs its trailing slash
fn normalize_base(base: &str) -> String {
    if base.ends_with('/') {
        base.to_owned()
    } else {
        format!("{}/", base)
    }
}

#[async_trait]
impl CatalogClient for MealDbClient {
    async fn fetch_random(&self) -> Result<Option<Meal>, FetchError> {
        let envelope: MealEnvelope = self.get_json("random.php", &[]).await?;
        Ok(envelope.meals.and_then(|meals| meals.into_iter().next()))
    }

    async fn search(&self, query: &str) -> Result<Vec<Meal>, FetchError> {
        let envelope: MealEnvelope = self.get_json("search.php", &[("s", query)]).await?;
        let meals = envelope.meals.unwrap_or_default();
        info!("Search '{}' matched {} meals", query, meals.len());
        Ok(meals)
    }

    async fn by_category(&self, name: &str) -> Result<Vec<Meal>, FetchError> {
        let envelope: MealEnvelope = self.get_json("filter.php", &[("c", name)]).await?;
        let meals = envelope.meals.unwrap_or_default();
        info!("Category '{}' holds {} meals", name, meals.len());
        Ok(meals)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
        let envelope: CategoryEnvelope = self.get_json("categories.php", &[]).await?;
        Ok(envelope.categories.unwrap_or_default())
    }
}
