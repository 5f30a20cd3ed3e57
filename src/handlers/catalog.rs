use actix_web::{get, post, web, HttpResponse, Responder};
use crate::models::{AppState, MealDetails, SearchQuery};
use log::info;

#[get("/meals")]
pub async fn list_meals(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.browser.snapshot())
}

#[get("/meals/search")]
pub async fn search_meals(
    data: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let text = query.into_inner().q.unwrap_or_default();
    data.browser.search(&text).await;

    let state = data.browser.snapshot();
    info!("Search '{}' now shows {} meals", text, state.meals.len());
    HttpResponse::Ok().json(state)
}

#[get("/meals/category/{name}")]
pub async fn meals_by_category(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let category = path.into_inner();
    data.browser.filter_by_category(&category).await;
    HttpResponse::Ok().json(data.browser.snapshot())
}

#[post("/meals/more")]
pub async fn load_more(data: web::Data<AppState>) -> impl Responder {
    data.browser.load_more().await;
    HttpResponse::Ok().json(data.browser.snapshot())
}

#[get("/meals/{index}")]
pub async fn meal_details(
    data: web::Data<AppState>,
    path: web::Path<usize>,
) -> impl Responder {
    let index = path.into_inner();
    match data.browser.meal(index) {
        Some(meal) => HttpResponse::Ok().json(MealDetails::from(&meal)),
        None => HttpResponse::NotFound().body(format!("No meal at position {}", index)),
    }
}

#[get("/categories")]
pub async fn list_categories(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.browser.load_categories().await)
}
