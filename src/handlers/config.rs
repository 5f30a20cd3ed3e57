use actix_web::{get, web, HttpResponse, Responder};
use crate::models::{AppState, ConfigResponse};

pub const RULES: &str = "To play, you have to guess the name of the dish! \
Use the letters to complete the name. Good luck!";

#[get("/config")]
pub async fn get_config(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ConfigResponse {
        config: data.config.clone(),
        rules: RULES,
    })
}
