use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionid";

/// Ledgers served under `/transaction/{kind}/`.
pub const LEDGERS: [&str; 6] = [
    "sales",
    "purchases",
    "incomes",
    "expenses",
    "creditors",
    "vendors",
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct RegisterUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Default)]
pub struct Backend {
    users: HashMap<String, (User, String)>,
    sessions: HashMap<String, String>,
    items: BTreeMap<u64, Value>,
    non_foods: BTreeMap<u64, Value>,
    ledgers: HashMap<String, Vec<Value>>,
    next_id: u64,
}

impl Backend {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn collection(&mut self, collection: Collection) -> &mut BTreeMap<u64, Value> {
        match collection {
            Collection::Items => &mut self.items,
            Collection::NonFoods => &mut self.non_foods,
        }
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<User> {
        let token = session_token(headers)?;
        let email = self.sessions.get(&token)?;
        self.users.get(email).map(|(user, _)| user.clone())
    }
}

pub type Db = Arc<RwLock<Backend>>;

#[derive(Clone, Copy)]
enum Collection {
    Items,
    NonFoods,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Backend::default()));
    Router::new()
        .route("/users/users/", post(register))
        .route("/users/users/login/", post(login))
        .route("/users/users/logout/", post(logout))
        .route("/users/users/me/", get(me))
        .route("/items/items/", get(list_items).post(create_item))
        .route(
            "/items/items/{id}/",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/nonfoods/", get(list_non_foods).post(create_non_food))
        .route(
            "/items/nonfoods/{id}/",
            get(get_non_food).put(update_non_food).delete(delete_non_food),
        )
        .route("/transaction/cash/", get(cash))
        .route("/transaction/{kind}/", get(list_ledger).post(create_ledger))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn fail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn unauthenticated() -> Response {
    fail(
        StatusCode::UNAUTHORIZED,
        "Authentication credentials were not provided.",
    )
}

fn not_found() -> Response {
    fail(StatusCode::NOT_FOUND, "Not found.")
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

// --- auth ---

async fn register(State(db): State<Db>, Json(input): Json<RegisterUser>) -> Response {
    if input.email.is_empty() || input.password.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "email and password are required.");
    }
    let mut backend = db.write().await;
    if backend.users.contains_key(&input.email) {
        return fail(StatusCode::BAD_REQUEST, "user with this email already exists.");
    }
    let user = User {
        id: backend.next_id(),
        email: input.email.clone(),
        name: input.name,
    };
    backend
        .users
        .insert(input.email, (user.clone(), input.password));
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn login(State(db): State<Db>, Json(input): Json<LoginUser>) -> Response {
    let mut backend = db.write().await;
    let user = match backend.users.get(&input.email) {
        Some((user, password)) if *password == input.password => user.clone(),
        _ => return fail(StatusCode::BAD_REQUEST, "Invalid credentials"),
    };
    let token = Uuid::new_v4().to_string();
    backend.sessions.insert(token.clone(), user.email.clone());
    tracing::info!(email = %user.email, "login");
    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"),
        )],
        Json(json!({ "user": user })),
    )
        .into_response()
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        db.write().await.sessions.remove(&token);
    }
    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}=; Path=/; Max-Age=0"),
        )],
        Json(json!({ "detail": "Logged out." })),
    )
        .into_response()
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> Response {
    match db.read().await.user_for(&headers) {
        Some(user) => Json(user).into_response(),
        None => unauthenticated(),
    }
}

// --- items and non-food items ---

/// Read a record from either a JSON or a multipart body.
///
/// File parts become `<field>_name` / `<field>_size`, and indexed
/// `units[i][key]` fields are folded into a `units` array.
async fn read_record(request: Request) -> Result<Map<String, Value>, Response> {
    let multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !multipart {
        let Json(value) = Json::<Value>::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        return match value {
            Value::Object(map) => Ok(map),
            _ => Err(fail(StatusCode::BAD_REQUEST, "expected a JSON object.")),
        };
    }

    let mut form = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut record = Map::new();
    let mut units: BTreeMap<usize, Map<String, Value>> = BTreeMap::new();

    while let Some(field) = form
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
            record.insert(format!("{name}_name"), Value::String(file_name));
            record.insert(format!("{name}_size"), json!(bytes.len()));
            continue;
        }
        let text = field.text().await.map_err(IntoResponse::into_response)?;
        match unit_field(&name) {
            Some((index, key)) => {
                units
                    .entry(index)
                    .or_default()
                    .insert(key.to_string(), Value::String(text));
            }
            None => {
                record.insert(name, Value::String(text));
            }
        }
    }

    if !units.is_empty() {
        let units = units.into_values().map(Value::Object).collect();
        record.insert("units".to_string(), Value::Array(units));
    }
    Ok(record)
}

/// `units[3][price]` -> `(3, "price")`.
fn unit_field(name: &str) -> Option<(usize, &str)> {
    let rest = name.strip_prefix("units[")?.strip_suffix(']')?;
    let (index, key) = rest.split_once("][")?;
    Some((index.parse().ok()?, key))
}

/// Matches `"true"`/`"false"` filters against bool or string fields.
fn field_matches(record: &Value, field: &str, wanted: &str) -> bool {
    match record.get(field) {
        Some(Value::Bool(b)) => b.to_string() == wanted,
        Some(Value::String(s)) => s == wanted,
        _ => false,
    }
}

async fn list_records(
    db: &Db,
    headers: &HeaderMap,
    collection: Collection,
    filters: &HashMap<String, String>,
) -> Response {
    let mut backend = db.write().await;
    if backend.user_for(headers).is_none() {
        return unauthenticated();
    }
    let search = filters.get("search").map(|s| s.to_lowercase());
    let records: Vec<Value> = backend
        .collection(collection)
        .values()
        .filter(|r| {
            search.as_ref().map_or(true, |needle| {
                r.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.to_lowercase().contains(needle))
            })
        })
        .filter(|r| ["veg", "is_available"].iter().all(|field| {
            filters
                .get(*field)
                .map_or(true, |wanted| field_matches(r, field, wanted))
        }))
        .cloned()
        .collect();
    Json(records).into_response()
}

async fn get_record(db: &Db, headers: &HeaderMap, collection: Collection, id: u64) -> Response {
    let mut backend = db.write().await;
    if backend.user_for(headers).is_none() {
        return unauthenticated();
    }
    match backend.collection(collection).get(&id) {
        Some(record) => Json(record.clone()).into_response(),
        None => not_found(),
    }
}

async fn create_record(db: &Db, collection: Collection, request: Request) -> Response {
    let headers = request.headers().clone();
    let mut record = match read_record(request).await {
        Ok(record) => record,
        Err(response) => return response,
    };
    let mut backend = db.write().await;
    if backend.user_for(&headers).is_none() {
        return unauthenticated();
    }
    let named = record
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.is_empty());
    if !named {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "name": ["This field is required."] })),
        )
            .into_response();
    }
    let id = backend.next_id();
    record.insert("id".to_string(), json!(id));
    let record = Value::Object(record);
    backend.collection(collection).insert(id, record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

async fn update_record(db: &Db, collection: Collection, id: u64, request: Request) -> Response {
    let headers = request.headers().clone();
    let changes = match read_record(request).await {
        Ok(changes) => changes,
        Err(response) => return response,
    };
    let mut backend = db.write().await;
    if backend.user_for(&headers).is_none() {
        return unauthenticated();
    }
    let Some(Value::Object(record)) = backend.collection(collection).get_mut(&id) else {
        return not_found();
    };
    for (key, value) in changes {
        if key != "id" {
            record.insert(key, value);
        }
    }
    Json(Value::Object(record.clone())).into_response()
}

async fn delete_record(db: &Db, headers: &HeaderMap, collection: Collection, id: u64) -> Response {
    let mut backend = db.write().await;
    if backend.user_for(headers).is_none() {
        return unauthenticated();
    }
    match backend.collection(collection).remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

async fn list_items(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    list_records(&db, &headers, Collection::Items, &filters).await
}

async fn get_item(State(db): State<Db>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    get_record(&db, &headers, Collection::Items, id).await
}

async fn create_item(State(db): State<Db>, request: Request) -> Response {
    create_record(&db, Collection::Items, request).await
}

async fn update_item(State(db): State<Db>, Path(id): Path<u64>, request: Request) -> Response {
    update_record(&db, Collection::Items, id, request).await
}

async fn delete_item(State(db): State<Db>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    delete_record(&db, &headers, Collection::Items, id).await
}

async fn list_non_foods(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    list_records(&db, &headers, Collection::NonFoods, &filters).await
}

async fn get_non_food(State(db): State<Db>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    get_record(&db, &headers, Collection::NonFoods, id).await
}

async fn create_non_food(State(db): State<Db>, request: Request) -> Response {
    create_record(&db, Collection::NonFoods, request).await
}

async fn update_non_food(State(db): State<Db>, Path(id): Path<u64>, request: Request) -> Response {
    update_record(&db, Collection::NonFoods, id, request).await
}

async fn delete_non_food(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    delete_record(&db, &headers, Collection::NonFoods, id).await
}

// --- ledgers ---

fn amount(record: &Value) -> f64 {
    ["total", "amount"]
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_f64))
        .unwrap_or(0.0)
}

async fn list_ledger(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(kind): Path<String>,
) -> Response {
    if !LEDGERS.contains(&kind.as_str()) {
        return not_found();
    }
    let backend = db.read().await;
    if backend.user_for(&headers).is_none() {
        return unauthenticated();
    }
    let records = backend.ledgers.get(&kind).cloned().unwrap_or_default();
    if kind == "sales" {
        let grand_total: f64 = records.iter().map(amount).sum();
        return Json(json!({ "sales": records, "grand_total": grand_total })).into_response();
    }
    Json(records).into_response()
}

async fn create_ledger(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(input): Json<Value>,
) -> Response {
    if !LEDGERS.contains(&kind.as_str()) {
        return not_found();
    }
    let Value::Object(mut record) = input else {
        return fail(StatusCode::BAD_REQUEST, "expected a JSON object.");
    };
    let mut backend = db.write().await;
    if backend.user_for(&headers).is_none() {
        return unauthenticated();
    }
    let id = backend.next_id();
    record.insert("id".to_string(), json!(id));
    let record = Value::Object(record);
    backend.ledgers.entry(kind).or_default().push(record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

async fn cash(State(db): State<Db>, headers: HeaderMap) -> Response {
    let backend = db.read().await;
    if backend.user_for(&headers).is_none() {
        return unauthenticated();
    }
    let total = |kind: &str| -> f64 {
        backend
            .ledgers
            .get(kind)
            .map(|records| records.iter().map(amount).sum())
            .unwrap_or(0.0)
    };
    let balance = total("sales") + total("incomes") - total("purchases") - total("expenses");
    Json(json!({ "balance": balance })).into_response()
}
