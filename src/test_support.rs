use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::errors::FetchError;
use crate::models::{Category, Meal};
use crate::services::catalog_client::CatalogClient;

pub fn meal(name: &str) -> Meal {
    Meal::new(
        name,
        format!("https://img.example/{}.jpg", name.replace(' ', "_")),
        Some(format!("Cook the {}.", name)),
        vec![Some("Salt".to_owned()), None, Some(" ".to_owned()), Some("Butter".to_owned())],
    )
}

/// In-memory `CatalogClient` fed from canned answers.
///
/// Random meals come off a queue (an empty queue answers "nothing"),
/// searches and categories are looked up by key. Any operation can be held
/// at a gate until released, which lets tests interleave requests.
#[derive(Default)]
pub struct ScriptedClient {
    random: Mutex<VecDeque<Option<Meal>>>,
    repeat_random: Mutex<Option<Meal>>,
    searches: Mutex<HashMap<String, Vec<Meal>>>,
    by_category: Mutex<HashMap<String, Vec<Meal>>>,
    categories: Mutex<Vec<Category>>,
    failing: AtomicBool,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_random(&self, meal: Option<Meal>) {
        self.random.lock().unwrap().push_back(meal);
    }

    /// Answer every random fetch with this meal once the queue runs dry
    pub fn repeat_random(&self, meal: Meal) {
        *self.repeat_random.lock().unwrap() = Some(meal);
    }

    pub fn set_search(&self, query: &str, meals: Vec<Meal>) {
        self.searches.lock().unwrap().insert(query.to_owned(), meals);
    }

    pub fn set_category(&self, name: &str, meals: Vec<Meal>) {
        self.by_category.lock().unwrap().insert(name.to_owned(), meals);
    }

    pub fn set_categories(&self, names: &[&str]) {
        *self.categories.lock().unwrap() = names
            .iter()
            .map(|name| Category { name: (*name).to_owned() })
            .collect();
    }

    pub fn fail_everything(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn hold(&self, op: &'static str) {
        self.gates.lock().unwrap().insert(op, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: &'static str) {
        if let Some(gate) = self.gates.lock().unwrap().get(op) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    async fn enter(&self, op: &'static str) -> Result<(), FetchError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;

        let gate = self.gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Network(format!("scripted {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for ScriptedClient {
    async fn fetch_random(&self) -> Result<Option<Meal>, FetchError> {
        self.enter("random").await?;
        let queued = self.random.lock().unwrap().pop_front();
        Ok(match queued {
            Some(meal) => meal,
            None => self.repeat_random.lock().unwrap().clone(),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<Meal>, FetchError> {
        self.enter("search").await?;
        Ok(self.searches.lock().unwrap().get(query).cloned().unwrap_or_default())
    }

    async fn by_category(&self, name: &str) -> Result<Vec<Meal>, FetchError> {
        self.enter("by_category").await?;
        Ok(self.by_category.lock().unwrap().get(name).cloned().unwrap_or_default())
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
        self.enter("categories").await?;
        Ok(self.categories.lock().unwrap().clone())
    }
}
