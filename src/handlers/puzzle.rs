use actix_web::{get, post, web, HttpResponse, Responder};
use crate::models::{AppState, CheckResponse, GameSession, MoveResponse, PuzzleView};
use crate::services::puzzle::{PuzzleState, Verdict};
use log::{info, warn};

fn view(state: &PuzzleState, verdict: Option<&Verdict>) -> PuzzleView {
    PuzzleView {
        thumbnail_url: state.thumbnail_url().to_owned(),
        slots: state.slot_views(),
        pool: state.letter_pool().to_vec(),
        selected: state.selected_letter(),
        complete: state.is_complete(),
        verdict: verdict.map(ToString::to_string),
        started_at: state.started_at(),
    }
}

fn no_round() -> HttpResponse {
    HttpResponse::NotFound().body("No puzzle in progress")
}

/// Run a board move and report whether it took effect
async fn apply_move<F>(data: &web::Data<AppState>, action: F) -> HttpResponse
where
    F: FnOnce(&mut PuzzleState) -> bool,
{
    let mut guard = data.session.lock().await;
    let session: &mut GameSession = &mut guard;

    let state = match session.state.as_mut() {
        Some(state) => state,
        None => return no_round(),
    };

    let applied = action(&mut *state);
    debug_assert!(state.letters_conserved());
    if applied {
        session.verdict = None;
    }

    HttpResponse::Ok().json(MoveResponse {
        applied,
        puzzle: view(state, session.verdict.as_ref()),
    })
}

#[post("/puzzle/new")]
pub async fn new_round(data: web::Data<AppState>) -> impl Responder {
    let client = data.client.clone();
    let result = data
        .puzzle
        .new_round(|| {
            let client = client.clone();
            async move {
                match client.fetch_random().await {
                    Ok(meal) => meal.into_iter().collect(),
                    Err(e) => {
                        warn!("Random meal for puzzle failed: {}", e);
                        Vec::new()
                    }
                }
            }
        })
        .await;

    match result {
        Ok(state) => {
            let mut session = data.session.lock().await;
            let body = view(&state, None);
            session.state = Some(state);
            session.verdict = None;
            HttpResponse::Ok().json(body)
        }
        Err(e) => {
            warn!("Could not start a puzzle round: {}", e);
            HttpResponse::ServiceUnavailable().body(e.to_string())
        }
    }
}

#[get("/puzzle")]
pub async fn current_round(data: web::Data<AppState>) -> impl Responder {
    let session = data.session.lock().await;
    match &session.state {
        Some(state) => HttpResponse::Ok().json(view(state, session.verdict.as_ref())),
        None => no_round(),
    }
}

#[post("/puzzle/select/{letter}")]
pub async fn select_letter(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let raw = path.into_inner();
    let mut chars = raw.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return HttpResponse::BadRequest().body(format!("'{}' is not a single letter", raw)),
    };

    apply_move(&data, |state| state.select_from_pool(letter)).await
}

#[post("/puzzle/deselect")]
pub async fn deselect_letter(data: web::Data<AppState>) -> impl Responder {
    apply_move(&data, PuzzleState::deselect).await
}

#[post("/puzzle/place/{index}")]
pub async fn place_letter(
    data: web::Data<AppState>,
    path: web::Path<usize>,
) -> impl Responder {
    let index = path.into_inner();
    apply_move(&data, |state| state.place_in_slot(index)).await
}

#[post("/puzzle/clear/{index}")]
pub async fn clear_slot(
    data: web::Data<AppState>,
    path: web::Path<usize>,
) -> impl Responder {
    let index = path.into_inner();
    apply_move(&data, |state| state.clear_slot(index)).await
}

#[post("/puzzle/check")]
pub async fn check_answer(data: web::Data<AppState>) -> impl Responder {
    let mut guard = data.session.lock().await;
    let session: &mut GameSession = &mut guard;

    let state = match session.state.as_ref() {
        Some(state) => state,
        None => return no_round(),
    };

    let verdict = state.evaluate();
    info!("Answer '{}' for '{}' checked: {}", state.assembled(), state.target_phrase(), verdict);

    let response = CheckResponse {
        correct: verdict == Verdict::Correct,
        message: verdict.to_string(),
        puzzle: view(state, Some(&verdict)),
    };
    session.verdict = Some(verdict);
    HttpResponse::Ok().json(response)
}
