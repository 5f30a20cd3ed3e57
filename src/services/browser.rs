use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::errors::FetchError;
use crate::models::Meal;
use crate::services::catalog_client::CatalogClient;

/// What the meal list currently represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ActiveFilter {
    /// Random feed; grows with `load_more`
    None,
    Category(String),
    Search(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogState {
    pub meals: Vec<Meal>,
    pub active_filter: ActiveFilter,
    pub categories: Vec<String>,
    /// Bumped whenever the list is reset; results fetched under an older
    /// generation are dropped
    pub generation: u64,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            meals: Vec::new(),
            active_filter: ActiveFilter::None,
            categories: Vec::new(),
            generation: 0,
            last_error: None,
            updated_at: None,
        }
    }
}

/// Clears the in-flight mark however the load ends, unless a load for a
/// newer generation has taken it over
struct InFlight<'a> {
    slot: &'a AtomicU64,
    mark: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.mark, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Meal list with random feed, category filter and search.
///
/// Fetch failures never reach the caller: they are logged, recorded in
/// `last_error`, and leave the list as it was after the reset. Every
/// change is published to `subscribe()` receivers.
pub struct CatalogBrowser {
    client: Arc<dyn CatalogClient>,
    page_size: usize,
    state: watch::Sender<CatalogState>,
    /// Generation + 1 of the `load_more` in flight, 0 when idle
    loading_more: AtomicU64,
}

impl CatalogBrowser {
    pub fn new(client: Arc<dyn CatalogClient>, page_size: usize) -> Self {
        let (state, _) = watch::channel(CatalogState::default());
        Self {
            client,
            page_size: page_size.max(1),
            state,
            loading_more: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CatalogState {
        self.state.borrow().clone()
    }

    pub fn meal(&self, index: usize) -> Option<Meal> {
        self.state.borrow().meals.get(index).cloned()
    }

    /// Categories first, then the first page of the random feed
    pub async fn bootstrap(&self) {
        self.load_categories().await;
        self.search("").await;
    }

    /// An empty query goes back to the random feed; anything else,
    /// whitespace included, is sent to the API as typed
    pub async fn search(&self, query: &str) {
        if query.is_empty() {
            let ticket = self.reset(ActiveFilter::None);
            let outcome = self.fetch_random_page().await;
            self.commit(ticket, outcome);
        } else {
            let ticket = self.reset(ActiveFilter::Search(query.to_owned()));
            let outcome = self.client.search(query).await;
            self.commit(ticket, outcome);
        }
    }

    pub async fn filter_by_category(&self, category: &str) {
        let ticket = self.reset(ActiveFilter::Category(category.to_owned()));
        let outcome = self.client.by_category(category).await;
        self.commit(ticket, outcome);
    }

    /// Append one random meal to the unfiltered feed. Returns whether the
    /// list grew.
    ///
    /// A call is refused while another one for the same generation is in
    /// flight; a load left over from an older generation does not block it.
    pub async fn load_more(&self) -> bool {
        let ticket = {
            let state = self.state.borrow();
            if state.active_filter != ActiveFilter::None {
                debug!("Ignoring load_more under {:?}", state.active_filter);
                return false;
            }
            state.generation
        };

        let mark = ticket + 1;
        let mut current = self.loading_more.load(Ordering::Acquire);
        loop {
            if current >= mark {
                debug!("load_more already in flight for generation {}", ticket);
                return false;
            }
            match self.loading_more.compare_exchange(
                current,
                mark,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        let _in_flight = InFlight {
            slot: &self.loading_more,
            mark,
        };

        let outcome = self
            .client
            .fetch_random()
            .await
            .map(|meal| meal.into_iter().collect::<Vec<_>>());
        let grew = matches!(&outcome, Ok(meals) if !meals.is_empty());

        self.commit(ticket, outcome) && grew
    }

    pub async fn load_categories(&self) -> Vec<String> {
        match self.client.fetch_categories().await {
            Ok(categories) => {
                let names: Vec<String> = categories.into_iter().map(|c| c.name).collect();
                info!("Loaded {} categories", names.len());
                let published = names.clone();
                self.state.send_modify(|state| {
                    state.categories = published;
                    state.updated_at = Some(Utc::now());
                });
                names
            }
            Err(e) => {
                warn!("Failed to load categories: {}", e);
                self.state.send_modify(|state| {
                    state.last_error = Some(e.to_string());
                });
                Vec::new()
            }
        }
    }

    async fn fetch_random_page(&self) -> Result<Vec<Meal>, FetchError> {
        let mut meals = Vec::with_capacity(self.page_size);
        for _ in 0..self.page_size {
            match self.client.fetch_random().await {
                Ok(Some(meal)) => meals.push(meal),
                Ok(None) => {}
                Err(e) if meals.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Random page cut short after {} meals: {}", meals.len(), e);
                    break;
                }
            }
        }
        Ok(meals)
    }

    /// Switch filter, empty the list and hand out a new generation ticket
    fn reset(&self, filter: ActiveFilter) -> u64 {
        let mut ticket = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.active_filter = filter;
            state.meals.clear();
            state.updated_at = Some(Utc::now());
            ticket = state.generation;
        });
        ticket
    }

    /// Apply a fetch outcome unless a newer request has reset the list since
    fn commit(&self, ticket: u64, outcome: Result<Vec<Meal>, FetchError>) -> bool {
        self.state.send_if_modified(|state| {
            if state.generation != ticket {
                debug!(
                    "Dropping stale result of generation {} (now {})",
                    ticket, state.generation
                );
                return false;
            }

            match outcome {
                Ok(meals) => {
                    state.meals.extend(meals);
                    state.last_error = None;
                }
                Err(e) => {
                    warn!("Fetch under {:?} failed: {}", state.active_filter, e);
                    state.last_error = Some(e.to_string());
                }
            }
            state.updated_at = Some(Utc::now());
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{meal, ScriptedClient};

    fn browser(client: &Arc<ScriptedClient>, page_size: usize) -> Arc<CatalogBrowser> {
        Arc::new(CatalogBrowser::new(client.clone(), page_size))
    }

    fn names(state: &CatalogState) -> Vec<&str> {
        state.meals.iter().map(|m| m.name()).collect()
    }

    #[tokio::test]
    async fn test_empty_search_with_empty_random_feed() {
        let client = Arc::new(ScriptedClient::new());
        let browser = browser(&client, 3);

        browser.search("").await;

        let state = browser.snapshot();
        assert!(state.meals.is_empty());
        assert_eq!(state.active_filter, ActiveFilter::None);
        assert_eq!(state.last_error, None);
        assert_eq!(client.calls("random"), 3);
    }

    #[tokio::test]
    async fn test_empty_search_loads_random_page() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.push_random(None);
        client.push_random(Some(meal("Poutine")));
        let browser = browser(&client, 3);

        browser.search("").await;

        assert_eq!(names(&browser.snapshot()), vec!["Kumpir", "Poutine"]);
    }

    #[tokio::test]
    async fn test_whitespace_query_is_sent_as_typed() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.set_search("  ", vec![meal("Fish Pie")]);
        client.set_search("pasta ", vec![meal("Pasta Bake")]);
        let browser = browser(&client, 1);

        browser.search("  ").await;
        let state = browser.snapshot();
        assert_eq!(names(&state), vec!["Fish Pie"]);
        assert_eq!(state.active_filter, ActiveFilter::Search("  ".to_owned()));
        assert_eq!(client.calls("search"), 1);
        assert_eq!(client.calls("random"), 0);

        browser.search("pasta ").await;
        let state = browser.snapshot();
        assert_eq!(names(&state), vec!["Pasta Bake"]);
        assert_eq!(state.active_filter, ActiveFilter::Search("pasta ".to_owned()));
    }

    #[tokio::test]
    async fn test_search_replaces_meals() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.set_search("pasta", vec![meal("Pasta Bake"), meal("Pasta Salad")]);
        let browser = browser(&client, 1);

        browser.search("").await;
        browser.search("pasta").await;

        let state = browser.snapshot();
        assert_eq!(names(&state), vec!["Pasta Bake", "Pasta Salad"]);
        assert_eq!(state.active_filter, ActiveFilter::Search("pasta".to_owned()));
    }

    #[tokio::test]
    async fn test_filter_by_category() {
        let client = Arc::new(ScriptedClient::new());
        client.set_category("Seafood", vec![meal("Fish Pie"), meal("Kedgeree")]);
        let browser = browser(&client, 1);

        browser.filter_by_category("Seafood").await;

        let state = browser.snapshot();
        assert_eq!(names(&state), vec!["Fish Pie", "Kedgeree"]);
        assert_eq!(state.active_filter, ActiveFilter::Category("Seafood".to_owned()));
    }

    #[tokio::test]
    async fn test_failed_search_leaves_list_empty() {
        let client = Arc::new(ScriptedClient::new());
        client.set_search("pasta", vec![meal("Pasta Bake")]);
        let browser = browser(&client, 1);
        browser.search("pasta").await;

        client.fail_everything();
        browser.search("pie").await;

        let state = browser.snapshot();
        assert!(state.meals.is_empty());
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn test_stale_category_result_is_dropped() {
        let client = Arc::new(ScriptedClient::new());
        client.set_category("Seafood", vec![meal("Fish Pie")]);
        client.set_search("pasta", vec![meal("Pasta Bake")]);
        client.hold("by_category");
        let browser = browser(&client, 1);

        let slow = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.filter_by_category("Seafood").await })
        };
        while client.calls("by_category") == 0 {
            tokio::task::yield_now().await;
        }

        browser.search("pasta").await;
        client.release("by_category");
        slow.await.unwrap();

        let state = browser.snapshot();
        assert_eq!(names(&state), vec!["Pasta Bake"]);
        assert_eq!(state.active_filter, ActiveFilter::Search("pasta".to_owned()));
    }

    #[tokio::test]
    async fn test_load_more_appends() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.push_random(Some(meal("Poutine")));
        let browser = browser(&client, 1);

        browser.search("").await;
        assert!(browser.load_more().await);
        assert!(!browser.load_more().await);

        assert_eq!(names(&browser.snapshot()), vec!["Kumpir", "Poutine"]);
    }

    #[tokio::test]
    async fn test_load_more_ignored_under_filter() {
        let client = Arc::new(ScriptedClient::new());
        client.set_search("pasta", vec![meal("Pasta Bake")]);
        client.push_random(Some(meal("Kumpir")));
        let browser = browser(&client, 1);

        browser.search("pasta").await;
        assert!(!browser.load_more().await);

        assert_eq!(client.calls("random"), 0);
        assert_eq!(names(&browser.snapshot()), vec!["Pasta Bake"]);
    }

    #[tokio::test]
    async fn test_concurrent_load_more_appends_once() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.push_random(Some(meal("Poutine")));
        client.hold("random");
        let browser = browser(&client, 1);

        let first = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.load_more().await })
        };
        while client.calls("random") == 0 {
            tokio::task::yield_now().await;
        }

        assert!(!browser.load_more().await);
        client.release("random");
        assert!(first.await.unwrap());

        assert_eq!(names(&browser.snapshot()), vec!["Kumpir"]);
        assert_eq!(client.calls("random"), 1);
    }

    #[tokio::test]
    async fn test_load_more_dropped_after_filter_change() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.set_category("Dessert", vec![meal("Eton Mess")]);
        client.hold("random");
        let browser = browser(&client, 1);

        let pending = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.load_more().await })
        };
        while client.calls("random") == 0 {
            tokio::task::yield_now().await;
        }

        browser.filter_by_category("Dessert").await;
        client.release("random");
        assert!(!pending.await.unwrap());

        assert_eq!(names(&browser.snapshot()), vec!["Eton Mess"]);
    }

    #[tokio::test]
    async fn test_stale_load_more_does_not_block_new_feed() {
        let client = Arc::new(ScriptedClient::new());
        client.push_random(Some(meal("Kumpir")));
        client.push_random(Some(meal("Poutine")));
        client.push_random(Some(meal("Bunny Chow")));
        client.hold("random");
        let browser = browser(&client, 1);

        let stale = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.load_more().await })
        };
        while client.calls("random") == 0 {
            tokio::task::yield_now().await;
        }

        // reset to a fresh random feed while the old load is still pending
        let refill = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.search("").await })
        };
        while client.calls("random") < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(browser.snapshot().generation, 1);

        let fresh = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.load_more().await })
        };
        while !fresh.is_finished() && client.calls("random") < 3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(client.calls("random"), 3);

        client.release("random");
        assert!(!stale.await.unwrap());
        refill.await.unwrap();
        assert!(fresh.await.unwrap());

        let state = browser.snapshot();
        assert_eq!(state.meals.len(), 2);
        assert_eq!(state.generation, 1);
    }

    #[tokio::test]
    async fn test_load_categories_and_bootstrap() {
        let client = Arc::new(ScriptedClient::new());
        client.set_categories(&["Beef", "Dessert", "Seafood"]);
        client.push_random(Some(meal("Kumpir")));
        let browser = browser(&client, 1);
        let mut updates = browser.subscribe();

        browser.bootstrap().await;

        assert!(updates.has_changed().unwrap());
        let state = updates.borrow_and_update().clone();
        assert_eq!(state.categories, vec!["Beef", "Dessert", "Seafood"]);
        assert_eq!(names(&state), vec!["Kumpir"]);
        assert_eq!(browser.meal(0).map(|m| m.name().to_owned()), Some("Kumpir".to_owned()));
        assert!(browser.meal(1).is_none());
    }

    #[tokio::test]
    async fn test_load_categories_failure_is_empty() {
        let client = Arc::new(ScriptedClient::new());
        client.fail_everything();
        let browser = browser(&client, 1);

        assert!(browser.load_categories().await.is_empty());
        assert!(browser.snapshot().last_error.is_some());
    }
}
