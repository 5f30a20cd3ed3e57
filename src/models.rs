use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::services::browser::CatalogBrowser;
use crate::services::catalog_client::CatalogClient;
use crate::services::puzzle::{PuzzleEngine, PuzzleState, Verdict};

/// TheMealDB records carry exactly this many ingredient columns
pub const MAX_INGREDIENTS: usize = 20;

pub const NO_INSTRUCTIONS: &str = "No description available.";

/// Application state shared across all handlers
pub struct AppState {
    pub config: ServiceConfig,
    pub client: Arc<dyn CatalogClient>,
    pub browser: CatalogBrowser,
    pub puzzle: PuzzleEngine,
    pub session: Mutex<GameSession>,
}

impl AppState {
    pub fn new(config: ServiceConfig, client: Arc<dyn CatalogClient>) -> Self {
        let browser = CatalogBrowser::new(client.clone(), config.page_size);
        let puzzle = PuzzleEngine::new(config.max_name_len, config.max_attempts);
        Self {
            config,
            client,
            browser,
            puzzle,
            session: Mutex::new(GameSession::default()),
        }
    }
}

/// Effective settings, assembled from the command line
#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
    pub listen_host: String,
    pub api_base: String,
    #[serde(serialize_with = "as_secs")]
    pub timeout: Duration,
    pub page_size: usize,
    pub max_name_len: usize,
    pub max_attempts: usize,
}

fn as_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0:2346".to_owned(),
            api_base: "https://www.themealdb.com/api/json/v1/1/".to_owned(),
            timeout: Duration::from_secs(10),
            page_size: 1,
            max_name_len: 12,
            max_attempts: 50,
        }
    }
}

/// The round currently being played, plus the last verdict shown for it
#[derive(Default)]
pub struct GameSession {
    pub state: Option<PuzzleState>,
    pub verdict: Option<Verdict>,
}

/// A dish as returned by the recipe API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MealRecord")]
pub struct Meal {
    name: String,
    thumbnail_url: String,
    instructions: Option<String>,
    ingredients: Vec<Option<String>>,
}

impl Meal {
    pub fn new(
        name: impl Into<String>,
        thumbnail_url: impl Into<String>,
        instructions: Option<String>,
        mut ingredients: Vec<Option<String>>,
    ) -> Self {
        ingredients.truncate(MAX_INGREDIENTS);
        Self {
            name: name.into(),
            thumbnail_url: thumbnail_url.into(),
            instructions,
            ingredients,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn instructions_or_default(&self) -> &str {
        self.instructions().unwrap_or(NO_INSTRUCTIONS)
    }

    /// Non-blank ingredients in their original order
    pub fn ingredient_list(&self) -> Vec<String> {
        self.ingredients
            .iter()
            .flatten()
            .filter(|ingredient| !ingredient.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Raw meal object; ingredient columns are picked out of the flattened rest
#[derive(Deserialize)]
struct MealRecord {
    #[serde(rename = "strMeal")]
    name: String,
    #[serde(rename = "strMealThumb", default)]
    thumbnail_url: Option<String>,
    #[serde(rename = "strInstructions", default)]
    instructions: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

impl From<MealRecord> for Meal {
    fn from(record: MealRecord) -> Self {
        let ingredients = (1..=MAX_INGREDIENTS)
            .map(|i| {
                record
                    .rest
                    .get(&format!("strIngredient{}", i))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            })
            .collect();

        Meal::new(
            record.name,
            record.thumbnail_url.unwrap_or_default(),
            record.instructions,
            ingredients,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename(deserialize = "strCategory"))]
    pub name: String,
}

/// `{"meals": [...]}`; the API sends `null` when nothing matched
#[derive(Deserialize)]
pub struct MealEnvelope {
    #[serde(default)]
    pub meals: Option<Vec<Meal>>,
}

#[derive(Deserialize)]
pub struct CategoryEnvelope {
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct MealDetails {
    pub name: String,
    pub thumbnail_url: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
}

impl From<&Meal> for MealDetails {
    fn from(meal: &Meal) -> Self {
        Self {
            name: meal.name().to_owned(),
            thumbnail_url: meal.thumbnail_url().to_owned(),
            ingredients: meal.ingredient_list(),
            instructions: meal.instructions_or_default().to_owned(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotView {
    Fixed,
    Empty,
    Letter(char),
}

/// What the player sees of a round; the answer itself stays server side
#[derive(Serialize)]
pub struct PuzzleView {
    pub thumbnail_url: String,
    pub slots: Vec<SlotView>,
    pub pool: Vec<char>,
    pub selected: Option<char>,
    pub complete: bool,
    pub verdict: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct MoveResponse {
    pub applied: bool,
    pub puzzle: PuzzleView,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub correct: bool,
    pub message: String,
    pub puzzle: PuzzleView,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub config: ServiceConfig,
    pub rules: &'static str,
}
