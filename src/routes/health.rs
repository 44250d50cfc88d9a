use axum::{extract::State, Json};
use diesel::prelude::*;
use serde_json::{json, Value};

use crate::{error::AppResult, state::AppState};

pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    diesel::sql_query("SELECT 1").execute(&mut conn)?;
    Ok(Json(json!({ "status": "ok" })))
}
