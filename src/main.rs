use actix_web::{web, App, HttpServer};
use clap::{Arg, ArgMatches, Command};
use log::{debug, error, info};
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;

mod errors;
mod handlers;
mod models;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use models::{AppState, ServiceConfig};
use services::catalog_client::MealDbClient;

// Function to initialize logging
fn init_logging(log_file: Option<&String>) {
    if let Some(file) = log_file {
        let log_output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .expect("Failed to open log file");

        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(log_output)))
            .init();
    } else {
        env_logger::init();
    }
}

fn cli() -> Command {
    Command::new("mealgamed")
        .version("0.1")
        .author("Ron Straight <straightre@gmail.com>")
        .about("Meal catalog browser and dish-name unscramble game")
        .arg(
            Arg::new("listen-host")
                .long("listen-host")
                .num_args(1)
                .default_value("0.0.0.0:2346")
                .help("Specify the listen address (e.g., 0.0.0.0:2346)"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .num_args(1)
                .help("Specify a log file path (if omitted, logs to stderr)"),
        )
        .arg(
            Arg::new("api-base")
                .long("api-base")
                .num_args(1)
                .default_value("https://www.themealdb.com/api/json/v1/1/")
                .help("Base URL of the recipe API"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .num_args(1)
                .value_parser(clap::value_parser!(u64))
                .default_value("10")
                .help("Timeout for a single recipe API request"),
        )
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .num_args(1)
                .value_parser(clap::value_parser!(usize))
                .default_value("1")
                .help("Random meals fetched when the search box is cleared"),
        )
        .arg(
            Arg::new("max-name-len")
                .long("max-name-len")
                .num_args(1)
                .value_parser(clap::value_parser!(usize))
                .default_value("12")
                .help("Longest dish name used for an unscramble round"),
        )
        .arg(
            Arg::new("max-attempts")
                .long("max-attempts")
                .num_args(1)
                .value_parser(clap::value_parser!(usize))
                .default_value("50")
                .help("Random fetches tried before a new round gives up"),
        )
}

fn config_from(matches: &ArgMatches) -> ServiceConfig {
    let defaults = ServiceConfig::default();
    ServiceConfig {
        listen_host: matches
            .get_one::<String>("listen-host")
            .cloned()
            .unwrap_or(defaults.listen_host),
        api_base: matches
            .get_one::<String>("api-base")
            .cloned()
            .unwrap_or(defaults.api_base),
        timeout: matches
            .get_one::<u64>("timeout-secs")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.timeout),
        page_size: matches.get_one::<usize>("page-size").copied().unwrap_or(defaults.page_size),
        max_name_len: matches
            .get_one::<usize>("max-name-len")
            .copied()
            .unwrap_or(defaults.max_name_len),
        max_attempts: matches
            .get_one::<usize>("max-attempts")
            .copied()
            .unwrap_or(defaults.max_attempts),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_one::<String>("log-file"));

    let config = config_from(&matches);
    info!(
        "Using recipe API at {} (names up to {} chars, {} attempts per round)",
        config.api_base, config.max_name_len, config.max_attempts
    );

    let client = match MealDbClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build recipe API client: {}", e);
            return Err(std::io::Error::other(e));
        }
    };
    let listen_host = config.listen_host.clone();
    let state = AppState::new(config, client);

    state.browser.bootstrap().await;
    let snapshot = state.browser.snapshot();
    info!(
        "Catalog ready with {} categories and {} meals",
        snapshot.categories.len(),
        snapshot.meals.len()
    );

    let mut updates = state.browser.subscribe();
    actix_web::rt::spawn(async move {
        while updates.changed().await.is_ok() {
            let catalog = updates.borrow_and_update();
            debug!(
                "Catalog now {} meals under {:?} (generation {})",
                catalog.meals.len(),
                catalog.active_filter,
                catalog.generation
            );
        }
    });

    let shared_state = web::Data::new(state);

    info!("Listening on {}", listen_host);
    HttpServer::new(move || {
        App::new()
            .app_data(shared_state.clone())
            .service(handlers::config::get_config)
            .service(handlers::catalog::list_meals)
            .service(handlers::catalog::search_meals)
            .service(handlers::catalog::meals_by_category)
            .service(handlers::catalog::load_more)
            .service(handlers::catalog::meal_details)
            .service(handlers::catalog::list_categories)
            .service(handlers::puzzle::new_round)
            .service(handlers::puzzle::current_round)
            .service(handlers::puzzle::select_letter)
            .service(handlers::puzzle::deselect_letter)
            .service(handlers::puzzle::place_letter)
            .service(handlers::puzzle::clear_slot)
            .service(handlers::puzzle::check_answer)
    })
    .bind(&listen_host)?
    .run()
    .await
}
