use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SignupRequest},
        repo::RepoError,
        repo_types::{NewUser, User},
        services::{clean_list, hash_password, is_valid_email, verify_or_dummy, AuthUser, JwtKeys},
    },
    error::ApiError,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/auth/profile", get(profile))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".into())
}

/// Email and password, normalized; both required.
fn credentials(email: Option<String>, password: Option<String>) -> Result<(String, String), ApiError> {
    let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }
    Ok((email, password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let (email, password) = credentials(payload.email, payload.password)?;

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if state.users.get_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(&password)?;
    let new_user = NewUser {
        email,
        password_hash,
        age: payload.age,
        height: payload.height,
        weight: payload.weight,
        address: payload.address.filter(|a| !a.is_null()),
        allergies: clean_list(payload.allergies),
        health_issues: clean_list(payload.health_issues),
        dietary_preferences: clean_list(payload.dietary_preferences),
    };

    let user = match state.users.insert(new_user).await {
        Ok(u) => u,
        // lost a race with a concurrent signup for the same email
        Err(RepoError::DuplicateEmail) => return Err(ApiError::Conflict("User already exists".into())),
        Err(RepoError::Other(e)) => return Err(e.into()),
    };

    let token = JwtKeys::from_ref(&state).sign(user.id, &user.email)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let (email, password) = credentials(payload.email, payload.password)?;

    let user = state.users.get_by_email(&email).await?;
    // unknown emails still pay for one Argon2 verification
    let verified = verify_or_dummy(&password, user.as_ref().map(|u| u.password_hash.as_str()))?;
    let user = match user {
        None => {
            warn!(email = %email, "login unknown email");
            return Err(invalid_credentials());
        }
        Some(user) if !verified => {
            warn!(user_id = %user.id, "login invalid password");
            return Err(invalid_credentials());
        }
        Some(user) => user,
    };

    let token = JwtKeys::from_ref(&state).sign(user.id, &user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user,
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, ApiError> {
    match state.users.get_by_id(user_id).await? {
        Some(user) => Ok(Json(user)),
        None => {
            warn!(user_id = %user_id, "token subject not found");
            Err(ApiError::NotFound("User not found".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn call(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn signup(state: &AppState, email: &str) -> (StatusCode, Value) {
        call(
            state,
            post_json(
                "/api/auth/signup",
                json!({
                    "email": email,
                    "password": "hunter2hunter2",
                    "allergies": ["Milk", " soy ", ""],
                    "height": "180",
                    "weight": ""
                }),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn signup_returns_token_and_profile_without_password() {
        let state = AppState::fake();
        let (status, body) = signup(&state, "Jane@Example.com ").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert_eq!(body["user"]["email"], "jane@example.com");
        assert_eq!(body["user"]["allergies"], json!(["Milk", "soy"]));
        assert_eq!(body["user"]["height"], 180.0);
        assert!(body["user"]["weight"].is_null());
        assert!(body["user"].get("password").is_none());
        assert!(body["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn signup_requires_email_and_password() {
        let state = AppState::fake();
        let (status, body) = call(&state, post_json("/api/auth/signup", json!({ "email": "a@b.co" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email and password are required");
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let state = AppState::fake();
        let req = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected_without_new_record() {
        let state = AppState::fake();
        let (first, created) = signup(&state, "dup@example.com").await;
        assert_eq!(first, StatusCode::OK);

        let (status, body) = signup(&state, "DUP@example.com").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User already exists");

        let stored = state.users.get_by_email("dup@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id.to_string(), created["user"]["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = AppState::fake();
        signup(&state, "user@example.com").await;

        let wrong_password = call(
            &state,
            post_json("/api/auth/login", json!({ "email": "user@example.com", "password": "nope-nope" })),
        )
        .await;
        let unknown_email = call(
            &state,
            post_json("/api/auth/login", json!({ "email": "ghost@example.com", "password": "nope-nope" })),
        )
        .await;

        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, unknown_email);
    }

    #[tokio::test]
    async fn unknown_email_costs_a_password_verification() {
        let state = AppState::fake();
        signup(&state, "user@example.com").await;
        let login = |email: &str| post_json("/api/auth/login", json!({ "email": email, "password": "nope-nope" }));

        // first unknown-email login also builds the dummy hash
        call(&state, login("warmup@example.com")).await;

        let started = Instant::now();
        call(&state, login("user@example.com")).await;
        let known = started.elapsed();

        let started = Instant::now();
        let (status, _) = call(&state, login("ghost@example.com")).await;
        let unknown = started.elapsed();

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(
            unknown * 4 >= known,
            "unknown email took {unknown:?}, known email took {known:?}"
        );
    }

    #[tokio::test]
    async fn login_then_profile() {
        let state = AppState::fake();
        signup(&state, "me@example.com").await;

        let (status, body) = call(
            &state,
            post_json("/api/auth/login", json!({ "email": "me@example.com", "password": "hunter2hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, profile) = call(&state, get_with_token("/api/auth/profile", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["email"], "me@example.com");
        assert_eq!(profile["allergies"], json!(["Milk", "soy"]));
        assert!(profile.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn profile_rejects_missing_or_bad_token() {
        let state = AppState::fake();
        let req = Request::get("/api/auth/profile").body(Body::empty()).unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "No token provided");

        let (status, body) = call(&state, get_with_token("/api/auth/profile", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn profile_for_deleted_subject_is_not_found() {
        use axum::extract::FromRef;
        use crate::auth::services::JwtKeys;

        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign(uuid::Uuid::new_v4(), "ghost@example.com")
            .unwrap();
        let (status, _) = call(&state, get_with_token("/api/auth/profile", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
