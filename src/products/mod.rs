pub mod client;
pub mod dto;
pub mod handlers;
pub mod translate;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::product_routes()
}
