use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use crate::auth::{JwtKeys, hash_password, verify_password};
use crate::config::CorsOrigins;
use dietlog_core::Error as DomainError;
use dietlog_core::admin_logs::{DEFAULT_LIMIT, LogFilter, LogPage, LogSelection};
use dietlog_core::db::{DEFAULT_USER_PAGE, Database};
use dietlog_core::models::{
    DaySheet, Food, LogKind, NewDailyLog, NewExerciseLog, NewFood, NewUser, Pagination, User,
    parse_date, validate_credentials,
};
use dietlog_core::profile::{ProfileUpdate, Recompute};
use dietlog_core::recommendations::{recommendations, tip_goal};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    jwt: Arc<JwtKeys>,
    bcrypt_cost: u32,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Set by `require_auth` for every protected route.
#[derive(Clone, Copy)]
struct AuthUser {
    id: i64,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    age: Option<i64>,
    gender: Option<String>,
    height: Option<f64>,
    weight: Option<f64>,
    target_weight: Option<f64>,
    activity_level: Option<String>,
    goal: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct SessionUser {
    id: i64,
    email: String,
    name: Option<String>,
    is_admin: bool,
    daily_calories: Option<f64>,
    daily_protein: Option<f64>,
    daily_carbs: Option<f64>,
    daily_fat: Option<f64>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            is_admin: user.is_admin,
            daily_calories: user.daily_calories,
            daily_protein: user.daily_protein,
            daily_carbs: user.daily_carbs,
            daily_fat: user.daily_fat,
        }
    }
}

#[derive(Deserialize)]
struct FoodRequest {
    name: Option<String>,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    serving_size: Option<String>,
    barcode: Option<String>,
    category: Option<String>,
}

impl FoodRequest {
    fn into_new_food(self) -> Result<NewFood, ApiError> {
        let (Some(name), Some(calories)) = (self.name, self.calories) else {
            return Err(ApiError::BadRequest(
                "name and calories are required".to_string(),
            ));
        };
        Ok(NewFood {
            name,
            calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            serving_size: self.serving_size,
            barcode: self.barcode,
            category: self.category.filter(|c| !c.trim().is_empty()),
        })
    }
}

#[derive(Deserialize)]
struct FoodQuery {
    search: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct DailyLogRequest {
    date: Option<String>,
    meal_type: Option<String>,
    food_id: Option<i64>,
    food_name: Option<String>,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    quantity: Option<f64>,
}

#[derive(Deserialize)]
struct WaterRequest {
    date: Option<String>,
    amount: Option<f64>,
}

#[derive(Deserialize)]
struct ExerciseRequest {
    date: Option<String>,
    exercise_name: Option<String>,
    duration: Option<i64>,
    calories_burned: Option<f64>,
}

#[derive(Deserialize)]
struct WeightRequest {
    date: Option<String>,
    weight: Option<f64>,
}

#[derive(Deserialize)]
struct FavoriteRequest {
    food_id: Option<i64>,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct AdminFoodQuery {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct AdminLogQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    user_id: Option<i64>,
    date_from: Option<String>,
    date_to: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::BadRequest(msg),
            DomainError::NotFound(msg) => Self::NotFound(msg),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Unauthorized(msg) => Self::Unauthorized(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DomainError>() {
            Ok(domain) => domain.into(),
            Err(err) => Self::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge(rejection.body_text()),
            _ => Self::BadRequest(rejection.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

// Extractors whose rejections answer with the JSON error body.

#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
struct ApiPath<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

fn optional_date(input: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    input
        .filter(|s| !s.is_empty())
        .map(parse_date)
        .transpose()
        .map_err(ApiError::from)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn recompute_label(outcome: &Recompute) -> &'static str {
    match outcome {
        Recompute::Full(_) => "full",
        Recompute::MacrosOnly(_) => "macros",
        Recompute::Unchanged => "unchanged",
        Recompute::Skipped { .. } => "skipped",
    }
}

async fn hash_blocking(password: String, cost: u32) -> Result<String, ApiError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .context("password hashing task failed")??;
    Ok(hash)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("password verification task failed")?;
    Ok(ok)
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.jwt.verify(token));

    match user_id {
        Some(id) => {
            request.extensions_mut().insert(AuthUser { id });
            next.run(request).await
        }
        None => ApiError::Unauthorized("Invalid or missing token".to_string()).into_response(),
    }
}

async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(AuthUser { id }) = request.extensions().get::<AuthUser>().copied() else {
        return ApiError::Unauthorized("Invalid or missing token".to_string()).into_response();
    };
    let is_admin = state.db().get_user(id).map(|user| user.is_admin);
    match is_admin {
        Ok(true) => next.run(request).await,
        Ok(false) => ApiError::Forbidden("Admin access required".to_string()).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::any(),
        CorsOrigins::List(list) => {
            AllowOrigin::list(list.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
        }
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

// --- Account handlers ---

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (email, password) = validate_credentials(req.email.as_deref(), req.password.as_deref())?;
    ProfileUpdate {
        age: req.age,
        height: req.height,
        weight: req.weight,
        target_weight: req.target_weight.map(Some),
        ..Default::default()
    }
    .validate()?;

    if state.db().get_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }
    let password_hash = hash_blocking(password, state.bcrypt_cost).await?;

    let user = state.db().create_user(&NewUser {
        email,
        password_hash,
        name: req.name,
        age: req.age,
        gender: req.gender,
        height: req.height,
        weight: req.weight,
        target_weight: req.target_weight,
        activity_level: req.activity_level,
        goal: req.goal,
        is_admin: false,
    })?;
    info!(user_id = user.id, "user registered");

    let token = state.jwt.issue(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered",
            "token": token,
            "user_id": user.id,
        })),
    ))
}

/// Look up the account and check the password. Unknown email and wrong
/// password produce the same error.
async fn authenticate(state: &AppState, req: LoginRequest) -> Result<User, ApiError> {
    let (email, password) = validate_credentials(req.email.as_deref(), req.password.as_deref())?;
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state.db().get_user_by_email(&email)?.ok_or_else(invalid)?;
    if !verify_blocking(password, user.password_hash.clone()).await? {
        return Err(invalid());
    }
    Ok(user)
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, req).await?;
    let token = state.jwt.issue(user.id)?;
    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": SessionUser::from(&user),
    })))
}

async fn admin_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, req).await?;
    if !user.is_admin {
        return Err(ApiError::Forbidden("This account is not an admin".to_string()));
    }
    let token = state.jwt.issue(user.id)?;
    info!(user_id = user.id, "admin signed in");
    Ok(Json(json!({
        "message": "Admin login successful",
        "token": token,
        "user": SessionUser::from(&user),
    })))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.db().get_user(auth.id)?))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    let (user, outcome) = state.db().update_profile(auth.id, &update)?;
    Ok(Json(json!({
        "message": "Profile updated",
        "recalculated": recompute_label(&outcome),
        "user": user,
    })))
}

// --- Food handlers ---

async fn list_foods(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FoodQuery>,
) -> Result<Json<Value>, ApiError> {
    let listing = state
        .db()
        .list_foods(query.search.as_deref(), query.category.as_deref())?;
    Ok(Json(json!(listing)))
}

async fn create_food(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FoodRequest>,
) -> Result<(StatusCode, Json<Food>), ApiError> {
    let new = req.into_new_food()?;
    let food = state.db().create_food(&new)?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn list_favorites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let foods = state.db().list_favorites(auth.id)?;
    Ok(Json(json!({ "foods": foods })))
}

async fn add_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<FavoriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let food_id = req
        .food_id
        .ok_or_else(|| ApiError::BadRequest("food_id is required".to_string()))?;
    state.db().add_favorite(auth.id, food_id)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Added to favorites", "food_id": food_id })),
    ))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(food_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.db().remove_favorite(auth.id, food_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Log handlers ---

async fn add_daily_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<DailyLogRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entry = NewDailyLog {
        date: optional_date(req.date.as_deref())?,
        meal_type: req.meal_type,
        food_id: req.food_id,
        food_name: req.food_name,
        calories: req.calories,
        protein: req.protein,
        carbs: req.carbs,
        fat: req.fat,
        quantity: req.quantity,
    };
    let log = state.db().add_daily_log(auth.id, &entry)?;
    Ok((StatusCode::CREATED, Json(json!(log))))
}

async fn get_daily_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(date_str): ApiPath<String>,
) -> Result<Json<DaySheet>, ApiError> {
    let date = parse_date(&date_str)?;
    Ok(Json(state.db().get_day_sheet(auth.id, date)?))
}

async fn add_water(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<WaterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let date = optional_date(req.date.as_deref())?;
    let log = state.db().add_water(auth.id, date, req.amount)?;
    Ok((StatusCode::CREATED, Json(json!(log))))
}

async fn add_exercise(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<ExerciseRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entry = NewExerciseLog {
        date: optional_date(req.date.as_deref())?,
        exercise_name: req.exercise_name,
        duration: req.duration,
        calories_burned: req.calories_burned,
    };
    let log = state.db().add_exercise(auth.id, &entry)?;
    Ok((StatusCode::CREATED, Json(json!(log))))
}

async fn add_weight(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<WeightRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let weight = req
        .weight
        .ok_or_else(|| ApiError::BadRequest("weight is required".to_string()))?;
    let date = optional_date(req.date.as_deref())?;
    let log = state.db().add_weight(auth.id, date, weight)?;
    Ok((StatusCode::CREATED, Json(json!(log))))
}

async fn weight_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let history = state.db().weight_history(auth.id)?;
    Ok(Json(json!({ "history": history })))
}

async fn delete_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((kind, id)): ApiPath<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let kind = LogKind::parse(&kind)?;
    state.db().delete_log(auth.id, kind, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Statistics and tips ---

async fn weekly_statistics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let summary = state.db().weekly_statistics(auth.id, today())?;
    Ok(Json(json!(summary)))
}

async fn monthly_statistics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let summary = state.db().monthly_statistics(auth.id, today())?;
    Ok(Json(json!(summary)))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let user = state.db().get_user(auth.id)?;
    let goal = tip_goal(user.goal.as_deref().unwrap_or(""));
    let tips = recommendations(goal, user.daily_calories, user.weight, user.target_weight);
    Ok(Json(json!({ "recommendations": tips })))
}

// --- Admin handlers ---

async fn admin_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.db().admin_stats(today())?;
    Ok(Json(json!(stats)))
}

async fn admin_list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = Pagination::new(query.page, query.limit, DEFAULT_USER_PAGE);
    let (users, total) = state.db().admin_list_users(page)?;
    Ok(Json(json!({
        "users": users,
        "total": total,
        "page": page.page,
        "limit": page.limit,
    })))
}

async fn admin_get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let detail = state.db().admin_get_user(id)?;
    Ok(Json(json!(detail)))
}

async fn admin_update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    let (user, outcome) = state.db().admin_update_user(id, &update)?;
    Ok(Json(json!({
        "message": "User updated",
        "recalculated": recompute_label(&outcome),
        "user": user,
    })))
}

async fn admin_delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.db().admin_delete_user(id)?;
    info!(admin_id = auth.id, user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_list_foods(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AdminFoodQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = Pagination::new(query.page, query.limit, DEFAULT_LIMIT);
    let db = state.db();
    let (foods, total) =
        db.admin_list_foods(page, query.search.as_deref(), query.category.as_deref())?;
    let categories = db.food_categories()?;
    Ok(Json(json!({
        "foods": foods,
        "categories": categories,
        "total": total,
        "page": page.page,
        "limit": page.limit,
    })))
}

async fn admin_update_food(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<FoodRequest>,
) -> Result<Json<Food>, ApiError> {
    let new = req.into_new_food()?;
    Ok(Json(state.db().update_food(id, &new)?))
}

async fn admin_delete_food(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.db().delete_food(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_logs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AdminLogQuery>,
) -> Result<Json<LogPage>, ApiError> {
    let selection = LogSelection::parse(query.kind.as_deref());
    let filter = LogFilter {
        user_id: query.user_id,
        date_from: optional_date(query.date_from.as_deref())?,
        date_to: optional_date(query.date_to.as_deref())?,
    };
    let page = Pagination::new(query.page, query.limit, DEFAULT_LIMIT);
    Ok(Json(state.db().admin_logs(selection, &filter, page)?))
}

// --- Router ---

fn build_router(state: AppState, cors: &CorsOrigins) -> Router {
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/admin/login", post(admin_login));

    let admin = Router::new()
        .route("/api/admin/stats", get(admin_stats))
        .route("/api/admin/users", get(admin_list_users))
        .route(
            "/api/admin/users/{id}",
            get(admin_get_user)
                .put(admin_update_user)
                .delete(admin_delete_user),
        )
        .route("/api/admin/foods", get(admin_list_foods).post(create_food))
        .route(
            "/api/admin/foods/{id}",
            put(admin_update_food).delete(admin_delete_food),
        )
        .route("/api/admin/logs", get(admin_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let protected = Router::new()
        .route("/api/user/profile", get(get_profile).put(update_profile))
        .route("/api/foods", get(list_foods).post(create_food))
        .route("/api/favorites", get(list_favorites).post(add_favorite))
        .route("/api/favorites/{food_id}", delete(remove_favorite))
        .route("/api/daily-log", post(add_daily_log))
        .route("/api/daily-log/{date}", get(get_daily_log))
        .route("/api/water", post(add_water))
        .route("/api/exercise", post(add_exercise))
        .route("/api/weight", post(add_weight))
        .route("/api/weight/history", get(weight_history))
        .route("/api/logs/{kind}/{id}", delete(delete_log))
        .route("/api/statistics/weekly", get(weekly_statistics))
        .route("/api/statistics/monthly", get(monthly_statistics))
        .route("/api/recommendations", get(get_recommendations))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(cors_layer(cors))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: Database,
    port: u16,
    bind: &str,
    jwt_secret: &str,
    cors: &CorsOrigins,
) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        jwt: Arc::new(JwtKeys::new(jwt_secret)),
        bcrypt_cost: bcrypt::DEFAULT_COST,
    };

    let app = build_router(state, cors);

    if *cors == CorsOrigins::Any {
        info!("CORS allows any origin");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const TEST_COST: u32 = 4;

    fn test_state() -> AppState {
        AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
            jwt: Arc::new(JwtKeys::new("test-secret")),
            bcrypt_cost: TEST_COST,
        }
    }

    fn test_app(state: &AppState) -> Router {
        build_router(state.clone(), &CorsOrigins::Any)
    }

    fn get(uri: &str, token: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::get(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn send_json(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn call(app: &Router, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn register(app: &Router, body: Value) -> String {
        let (status, json) = call(app, send_json(Method::POST, "/api/register", None, &body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["token"].as_str().unwrap().to_string()
    }

    fn full_profile(email: &str) -> Value {
        json!({
            "email": email,
            "password": "pw12345",
            "name": "Ada",
            "age": 30,
            "gender": "female",
            "height": 170.0,
            "weight": 70.0,
            "activity_level": "moderate",
            "goal": "kilo verme",
        })
    }

    fn admin_token(state: &AppState) -> String {
        let hash = hash_password("adminpw", TEST_COST).unwrap();
        let admin = state
            .db()
            .upsert_admin("admin@x.com", &hash, Some("Admin"))
            .unwrap();
        state.jwt.issue(admin.id).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let state = test_state();
        let (status, json) = call(&test_app(&state), get("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn missing_token_returns_401() {
        let state = test_state();
        let (status, json) = call(&test_app(&state), get("/api/user/profile", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "Invalid or missing token");
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let state = test_state();
        let forged = JwtKeys::new("other-secret").issue(1).unwrap();
        let (status, _) = call(&test_app(&state), get("/api/user/profile", Some(&forged))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let state = test_state();
        let response = test_app(&state)
            .oneshot(get("/api/foods", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let state = test_state();
        let big_body = vec![b' '; BODY_LIMIT + 1];
        let response = test_app(&state)
            .oneshot(
                axum::http::Request::post("/api/register")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn register_computes_targets() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("ada@x.com")).await;

        let (status, user) = call(&app, get("/api/user/profile", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["email"], "ada@x.com");
        assert_eq!(user["bmr"], 1451.5);
        assert_eq!(user["tdee"], 2249.83);
        assert_eq!(user["daily_calories"], 1749.83);
        assert_eq!(user["daily_protein"], 131.24);
        assert_eq!(user["daily_carbs"], 174.98);
        assert_eq!(user["daily_fat"], 58.33);
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_without_metrics_leaves_targets_empty() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, json!({ "email": "b@x.com", "password": "pw" })).await;

        let (_, user) = call(&app, get("/api/user/profile", Some(&token))).await;
        assert!(user["bmr"].is_null());
        assert!(user["daily_calories"].is_null());
    }

    #[tokio::test]
    async fn register_rejects_missing_and_duplicate() {
        let state = test_state();
        let app = test_app(&state);

        let (status, json) = call(
            &app,
            send_json(Method::POST, "/api/register", None, &json!({ "email": "c@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Email and password are required");

        register(&app, full_profile("c@x.com")).await;
        let (status, _) = call(
            &app,
            send_json(Method::POST, "/api/register", None, &full_profile("C@X.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let state = test_state();
        let app = test_app(&state);
        register(&app, full_profile("d@x.com")).await;

        let (status, json) = call(
            &app,
            send_json(
                Method::POST,
                "/api/login",
                None,
                &json!({ "email": "d@x.com", "password": "pw12345" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["daily_calories"], 1749.83);
        let token = json["token"].as_str().unwrap();
        let (status, _) = call(&app, get("/api/user/profile", Some(token))).await;
        assert_eq!(status, StatusCode::OK);

        for body in [
            json!({ "email": "d@x.com", "password": "nope" }),
            json!({ "email": "nobody@x.com", "password": "pw12345" }),
        ] {
            let (status, json) = call(&app, send_json(Method::POST, "/api/login", None, &body)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json["error"], "Invalid email or password");
        }
    }

    #[tokio::test]
    async fn goal_change_recomputes_macros_only() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("e@x.com")).await;

        let (status, json) = call(
            &app,
            send_json(
                Method::PUT,
                "/api/user/profile",
                Some(&token),
                &json!({ "goal": "kilo alma" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["recalculated"], "macros");
        assert_eq!(json["user"]["tdee"], 2249.83);
        assert_eq!(json["user"]["daily_calories"], 2749.83);

        let (status, _) = call(
            &app,
            send_json(Method::PUT, "/api/user/profile", Some(&token), &json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metric_change_without_inputs_is_rejected() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, json!({ "email": "f@x.com", "password": "pw" })).await;

        let (status, json) = call(
            &app,
            send_json(
                Method::PUT,
                "/api/user/profile",
                Some(&token),
                &json!({ "weight": 80.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("height"));

        let (_, user) = call(&app, get("/api/user/profile", Some(&token))).await;
        assert!(user["weight"].is_null());
    }

    #[tokio::test]
    async fn daily_logs_add_up() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("g@x.com")).await;

        for calories in [200.0, 300.0] {
            let (status, _) = call(
                &app,
                send_json(
                    Method::POST,
                    "/api/daily-log",
                    Some(&token),
                    &json!({ "date": "2024-06-01", "food_name": "Soup", "calories": calories }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, _) = call(
            &app,
            send_json(
                Method::POST,
                "/api/water",
                Some(&token),
                &json!({ "date": "2024-06-01" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, sheet) = call(&app, get("/api/daily-log/2024-06-01", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sheet["logs"].as_array().unwrap().len(), 2);
        assert_eq!(sheet["totals"]["calories"], 500.0);
        assert_eq!(sheet["totals"]["water"], 250.0);

        let (status, _) = call(&app, get("/api/daily-log/June-first", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn owner_can_delete_log() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("h@x.com")).await;
        let other = register(&app, full_profile("i@x.com")).await;

        let (_, log) = call(
            &app,
            send_json(
                Method::POST,
                "/api/exercise",
                Some(&token),
                &json!({ "exercise_name": "Run", "duration": 30, "calories_burned": 300.0 }),
            ),
        )
        .await;
        let uri = format!("/api/logs/exercise/{}", log["id"]);

        let request = axum::http::Request::delete(uri.as_str())
            .header("Authorization", format!("Bearer {other}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::NOT_FOUND);

        let request = axum::http::Request::delete(uri.as_str())
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::NO_CONTENT);

        let request = axum::http::Request::delete("/api/logs/sleep/1")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn weight_log_updates_profile() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("j@x.com")).await;

        let (status, _) = call(
            &app,
            send_json(Method::POST, "/api/weight", Some(&token), &json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            send_json(
                Method::POST,
                "/api/weight",
                Some(&token),
                &json!({ "date": "2024-06-02", "weight": 75.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, user) = call(&app, get("/api/user/profile", Some(&token))).await;
        assert_eq!(user["weight"], 75.0);
        assert_eq!(user["bmr"], 1501.5);

        let (_, history) = call(&app, get("/api/weight/history", Some(&token))).await;
        assert_eq!(history["history"][0]["weight"], 75.0);
    }

    #[tokio::test]
    async fn favorites_lifecycle() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("k@x.com")).await;

        let (status, food) = call(
            &app,
            send_json(
                Method::POST,
                "/api/foods",
                Some(&token),
                &json!({ "name": "Lentil soup", "calories": 180.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(food["category"], "Other");
        let food_id = food["id"].as_i64().unwrap();

        let add = |body: Value| send_json(Method::POST, "/api/favorites", Some(&token), &body);
        assert_eq!(call(&app, add(json!({}))).await.0, StatusCode::BAD_REQUEST);
        assert_eq!(call(&app, add(json!({ "food_id": 9999 }))).await.0, StatusCode::NOT_FOUND);
        assert_eq!(call(&app, add(json!({ "food_id": food_id }))).await.0, StatusCode::CREATED);
        assert_eq!(call(&app, add(json!({ "food_id": food_id }))).await.0, StatusCode::CONFLICT);

        let (_, favorites) = call(&app, get("/api/favorites", Some(&token))).await;
        assert_eq!(favorites["foods"][0]["name"], "Lentil soup");

        let request = axum::http::Request::delete(format!("/api/favorites/{food_id}"))
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn food_search_and_validation() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("l@x.com")).await;

        let (status, _) = call(
            &app,
            send_json(Method::POST, "/api/foods", Some(&token), &json!({ "name": "Air" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for (name, category) in [("Apple", "Fruit"), ("Apricot", "Fruit"), ("Bread", "Grain")] {
            call(
                &app,
                send_json(
                    Method::POST,
                    "/api/foods",
                    Some(&token),
                    &json!({ "name": name, "calories": 50.0, "category": category }),
                ),
            )
            .await;
        }
        let (status, listing) = call(&app, get("/api/foods?search=ap", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["foods"].as_array().unwrap().len(), 2);
        assert_eq!(listing["categories"], json!(["Fruit", "Grain"]));
    }

    #[tokio::test]
    async fn statistics_and_recommendations() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("m@x.com")).await;

        let (status, week) = call(&app, get("/api/statistics/weekly", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(week["daily_stats"].as_array().unwrap().len(), 7);
        assert_eq!(week["averages"]["calories"], 0.0);

        let (status, month) = call(&app, get("/api/statistics/monthly", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(month["daily_stats"].as_array().unwrap().len(), 30);

        let (status, tips) = call(&app, get("/api/recommendations", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        let tips = tips["recommendations"].as_array().unwrap();
        assert_eq!(tips.len(), 6);
        assert!(tips.iter().any(|t| t["description"].as_str().unwrap().contains("1749")));
    }

    #[tokio::test]
    async fn admin_routes_require_admin() {
        let state = test_state();
        let app = test_app(&state);
        let token = register(&app, full_profile("n@x.com")).await;

        let (status, json) = call(&app, get("/api/admin/stats", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "Admin access required");

        let (status, _) = call(
            &app,
            send_json(
                Method::POST,
                "/api/admin/login",
                None,
                &json!({ "email": "n@x.com", "password": "pw12345" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_login_and_stats() {
        let state = test_state();
        let app = test_app(&state);
        admin_token(&state);
        register(&app, full_profile("o@x.com")).await;

        let (status, json) = call(
            &app,
            send_json(
                Method::POST,
                "/api/admin/login",
                None,
                &json!({ "email": "admin@x.com", "password": "adminpw" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["is_admin"], true);
        let token = json["token"].as_str().unwrap();

        let (status, stats) = call(&app, get("/api/admin/stats", Some(token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_users"], 1);

        let (_, users) = call(&app, get("/api/admin/users?page=1&limit=5", Some(token))).await;
        assert_eq!(users["total"], 1);
        assert_eq!(users["limit"], 5);
        assert_eq!(users["users"][0]["email"], "o@x.com");
    }

    #[tokio::test]
    async fn admin_manages_users() {
        let state = test_state();
        let app = test_app(&state);
        let admin = admin_token(&state);
        let token = register(&app, full_profile("p@x.com")).await;
        let (_, profile) = call(&app, get("/api/user/profile", Some(&token))).await;
        let uri = format!("/api/admin/users/{}", profile["id"]);

        let (status, json) = call(
            &app,
            send_json(Method::PUT, &uri, Some(&admin), &json!({ "weight": 75.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["recalculated"], "full");
        assert_eq!(json["user"]["bmr"], 1501.5);

        let (status, detail) = call(&app, get(&uri, Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["stats"]["total_logs"], 0);

        let request = axum::http::Request::delete(uri.as_str())
            .header("Authorization", format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::NO_CONTENT);
        assert_eq!(call(&app, get(&uri, Some(&admin))).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleted_account_cannot_log() {
        let state = test_state();
        let app = test_app(&state);
        let admin = admin_token(&state);
        let token = register(&app, full_profile("gone@x.com")).await;
        let (_, profile) = call(&app, get("/api/user/profile", Some(&token))).await;

        let request = axum::http::Request::delete(format!("/api/admin/users/{}", profile["id"]))
            .header("Authorization", format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::NO_CONTENT);

        let (status, json) = call(
            &app,
            send_json(Method::POST, "/api/water", Some(&token), &json!({ "amount": 250.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "User not found");
    }

    #[tokio::test]
    async fn admin_log_feed_merges_tables() {
        let state = test_state();
        let app = test_app(&state);
        let admin = admin_token(&state);
        let token = register(&app, full_profile("q@x.com")).await;

        for (uri, body) in [
            ("/api/daily-log", json!({ "date": "2024-06-01", "calories": 100.0 })),
            ("/api/water", json!({ "date": "2024-06-01", "amount": 500.0 })),
            ("/api/exercise", json!({ "date": "2024-06-02", "calories_burned": 90.0 })),
            ("/api/weight", json!({ "date": "2024-06-03", "weight": 69.5 })),
        ] {
            let (status, _) = call(&app, send_json(Method::POST, uri, Some(&token), &body)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, page) = call(&app, get("/api/admin/logs", Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 4);
        assert_eq!(page["page"], 1);
        assert_eq!(page["limit"], 50);
        let logs = page["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 4);
        assert!(logs.iter().all(|l| l["email"] == "q@x.com"));
        assert!(
            logs.windows(2)
                .all(|w| w[0]["created_at"].as_str() >= w[1]["created_at"].as_str())
        );

        let (_, page) = call(&app, get("/api/admin/logs?type=water", Some(&admin))).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["logs"][0]["log_type"], "water");
        assert_eq!(page["logs"][0]["amount"], 500.0);

        let (_, page) = call(
            &app,
            get("/api/admin/logs?date_from=2024-06-02&date_to=2024-06-02", Some(&admin)),
        )
        .await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["logs"][0]["log_type"], "exercise");

        let (status, _) = call(&app, get("/api/admin/logs?date_from=yesterday", Some(&admin))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let state = test_state();
        let app = test_app(&state);
        let admin = admin_token(&state);
        let token = register(&app, full_profile("r@x.com")).await;
        let (status, _) = call(
            &app,
            send_json(Method::POST, "/api/water", Some(&token), &json!({ "amount": 250.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        for uri in [
            "/api/admin/logs?page=9223372036854775807&limit=500",
            "/api/admin/logs?type=water&page=9223372036854775807&limit=500",
            "/api/admin/users?page=9223372036854775807&limit=500",
            "/api/admin/foods?page=9223372036854775807&limit=500",
        ] {
            let (status, json) = call(&app, get(uri, Some(&admin))).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            let rows = json
                .get("logs")
                .or_else(|| json.get("users"))
                .or_else(|| json.get("foods"))
                .unwrap();
            assert_eq!(rows, &json!([]), "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_input_gets_json_error() {
        let state = test_state();
        let app = test_app(&state);
        let admin = admin_token(&state);

        let (status, json) = call(
            &app,
            send_json(
                Method::POST,
                "/api/register",
                None,
                &json!({ "email": "a@x.com", "password": "pw", "age": "thirty" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("age"));

        let request = axum::http::Request::post("/api/login")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, json) = call(&app, get("/api/admin/users/abc", Some(&admin))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, json) = call(&app, get("/api/admin/logs?page=first", Some(&admin))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn admin_food_management() {
        let state = test_state();
        let app = test_app(&state);
        let admin = admin_token(&state);

        let (status, food) = call(
            &app,
            send_json(
                Method::POST,
                "/api/admin/foods",
                Some(&admin),
                &json!({ "name": "Yoghurt", "calories": 60.0, "category": "Dairy" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/admin/foods/{}", food["id"]);

        let (status, updated) = call(
            &app,
            send_json(
                Method::PUT,
                &uri,
                Some(&admin),
                &json!({ "name": "Greek yoghurt", "calories": 97.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Greek yoghurt");

        let (_, listing) = call(&app, get("/api/admin/foods?search=greek", Some(&admin))).await;
        assert_eq!(listing["total"], 1);

        let (status, _) = call(
            &app,
            send_json(
                Method::PUT,
                "/api/admin/foods/9999",
                Some(&admin),
                &json!({ "name": "Ghost", "calories": 1.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = axum::http::Request::delete(uri.as_str())
            .header("Authorization", format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn cors_preflight_allows_origin() {
        let state = test_state();
        let response = test_app(&state)
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/foods")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "*"
        );
    }
}
