//! The single facade the console UI calls.
//!
//! # Design
//! `Gateway` holds only a `Transport` and carries no mutable state between
//! calls. Each method names one logical backend operation and hides its
//! path, verb and candidate list. Operations whose routing prefix drifted
//! between backend versions (items and non-food items) go through the
//! resolver; everything else is a single direct exchange.
//!
//! Every method returns the parsed payload, `None` for a bodiless success, or
//! an `ApiError`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{RequestBody, RequestSpec};
use crate::resolver::{resolve, CandidateList};
use crate::session::AuthApi;
use crate::transport::Transport;
use crate::types::{LoginRequest, LoginResponse, RegisterRequest, UserRecord};

const LOGIN: &str = "/users/users/login/";
const LOGOUT: &str = "/users/users/logout/";
const REGISTER: &str = "/users/users/";
const CURRENT_USER: &str = "/users/users/me/";

const SALES: &str = "/transaction/sales/";
const PURCHASES: &str = "/transaction/purchases/";
const INCOMES: &str = "/transaction/incomes/";
const EXPENSES: &str = "/transaction/expenses/";
const CREDITORS: &str = "/transaction/creditors/";
const VENDORS: &str = "/transaction/vendors/";
const CASH: &str = "/transaction/cash/";

const ITEM_PREFIXES: [&str; 2] = ["/items/items/", "/items/"];
const NON_FOOD_PREFIXES: [&str; 5] = [
    "/items/nonfood/",
    "/items/nonfoods/",
    "/nonfood/",
    "/nonfoods/",
    "/transaction/nonfoods/",
];
const NON_FOOD_DELETE_PREFIXES: [&str; 3] = ["/items/nonfood/", "/items/nonfoods/", "/nonfoods/"];

/// Candidates for the item collection, or one item when `id` is given.
pub fn item_paths(id: Option<&str>) -> CandidateList {
    under_prefixes(&ITEM_PREFIXES, id)
}

/// Candidates for the non-food collection, or one record when `id` is given.
pub fn non_food_paths(id: Option<&str>) -> CandidateList {
    under_prefixes(&NON_FOOD_PREFIXES, id)
}

/// Deletion has only ever been routed under these prefixes.
pub fn non_food_delete_paths(id: &str) -> CandidateList {
    under_prefixes(&NON_FOOD_DELETE_PREFIXES, Some(id))
}

fn under_prefixes(prefixes: &[&str], id: Option<&str>) -> CandidateList {
    CandidateList::new(prefixes.iter().map(|prefix| match id {
        Some(id) => format!("{prefix}{id}/"),
        None => (*prefix).to_string(),
    }))
}

/// Encode list filters as `?a=b&c=d`, dropping absent and empty values.
///
/// Returns an empty string when nothing is left.
pub fn query_string<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let kept: Vec<(&str, &str)> = params
        .into_iter()
        .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (k, v)))
        .collect();
    if kept.is_empty() {
        return String::new();
    }
    // Pairs of strings always encode.
    match serde_urlencoded::to_string(&kept) {
        Ok(encoded) => format!("?{encoded}"),
        Err(_) => String::new(),
    }
}

fn json_body<T: Serialize + ?Sized>(data: &T) -> Result<RequestBody, ApiError> {
    serde_json::to_value(data)
        .map(RequestBody::Json)
        .map_err(|e| ApiError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(
    value: Option<Value>,
    what: &str,
) -> Result<T, ApiError> {
    let value = value.ok_or_else(|| ApiError::Decode(format!("empty {what} response")))?;
    serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{what}: {e}")))
}

/// Stateless dispatcher for every backend operation the console uses.
#[derive(Debug, Clone)]
pub struct Gateway {
    transport: Transport,
}

impl Gateway {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send an arbitrary `RequestSpec` directly, without fall-through.
    pub async fn request(&self, spec: &RequestSpec) -> Result<Option<Value>, ApiError> {
        self.transport.send(spec).await
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.transport.send(&RequestSpec::get(path)).await
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<Option<Value>, ApiError> {
        let spec = RequestSpec::post(path).with_body(json_body(data)?);
        self.transport.send(&spec).await
    }

    // ==================== AUTH ====================

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let value = self.post(LOGIN, &LoginRequest { email, password }).await?;
        decode(value, "login")
    }

    pub async fn logout(&self) -> Result<Option<Value>, ApiError> {
        self.transport.send(&RequestSpec::post(LOGOUT)).await
    }

    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Option<Value>, ApiError> {
        self.post(REGISTER, &RegisterRequest { email, name, password })
            .await
    }

    pub async fn current_user(&self) -> Result<UserRecord, ApiError> {
        let value = self.get(CURRENT_USER).await?;
        decode(value, "current user")
    }

    // ==================== ITEMS ====================

    /// List items. `filters` are `(name, value)` pairs; unset values are omitted.
    pub async fn list_items<'a, I>(&self, filters: I) -> Result<Option<Value>, ApiError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let candidates = item_paths(None).with_suffix(&query_string(filters));
        resolve(&self.transport, &candidates, &RequestSpec::get("")).await
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<Value>, ApiError> {
        resolve(&self.transport, &item_paths(Some(id)), &RequestSpec::get("")).await
    }

    /// Create an item from a JSON value or, with an image attached, a `FormData`.
    pub async fn create_item(
        &self,
        body: impl Into<RequestBody>,
    ) -> Result<Option<Value>, ApiError> {
        let template = RequestSpec::post("").with_body(body);
        resolve(&self.transport, &item_paths(None), &template).await
    }

    pub async fn update_item(
        &self,
        id: &str,
        body: impl Into<RequestBody>,
    ) -> Result<Option<Value>, ApiError> {
        let template = RequestSpec::put("").with_body(body);
        resolve(&self.transport, &item_paths(Some(id)), &template).await
    }

    pub async fn delete_item(&self, id: &str) -> Result<Option<Value>, ApiError> {
        resolve(&self.transport, &item_paths(Some(id)), &RequestSpec::delete("")).await
    }

    // ==================== TRANSACTIONS ====================

    pub async fn list_sales(&self) -> Result<Option<Value>, ApiError> {
        self.get(SALES).await
    }

    pub async fn create_sale<T: Serialize + ?Sized>(
        &self,
        sale: &T,
    ) -> Result<Option<Value>, ApiError> {
        self.post(SALES, sale).await
    }

    pub async fn list_purchases(&self) -> Result<Option<Value>, ApiError> {
        self.get(PURCHASES).await
    }

    pub async fn create_purchase<T: Serialize + ?Sized>(
        &self,
        purchase: &T,
    ) -> Result<Option<Value>, ApiError> {
        self.post(PURCHASES, purchase).await
    }

    pub async fn list_incomes(&self) -> Result<Option<Value>, ApiError> {
        self.get(INCOMES).await
    }

    pub async fn create_income<T: Serialize + ?Sized>(
        &self,
        income: &T,
    ) -> Result<Option<Value>, ApiError> {
        self.post(INCOMES, income).await
    }

    pub async fn list_expenses(&self) -> Result<Option<Value>, ApiError> {
        self.get(EXPENSES).await
    }

    pub async fn create_expense<T: Serialize + ?Sized>(
        &self,
        expense: &T,
    ) -> Result<Option<Value>, ApiError> {
        self.post(EXPENSES, expense).await
    }

    pub async fn list_creditors(&self) -> Result<Option<Value>, ApiError> {
        self.get(CREDITORS).await
    }

    pub async fn create_creditor<T: Serialize + ?Sized>(
        &self,
        creditor: &T,
    ) -> Result<Option<Value>, ApiError> {
        self.post(CREDITORS, creditor).await
    }

    pub async fn list_vendors(&self) -> Result<Option<Value>, ApiError> {
        self.get(VENDORS).await
    }

    pub async fn create_vendor<T: Serialize + ?Sized>(
        &self,
        vendor: &T,
    ) -> Result<Option<Value>, ApiError> {
        self.post(VENDORS, vendor).await
    }

    // ==================== NON-FOOD ITEMS ====================

    pub async fn list_non_foods(&self) -> Result<Option<Value>, ApiError> {
        resolve(&self.transport, &non_food_paths(None), &RequestSpec::get("")).await
    }

    pub async fn get_non_food(&self, id: &str) -> Result<Option<Value>, ApiError> {
        resolve(&self.transport, &non_food_paths(Some(id)), &RequestSpec::get("")).await
    }

    pub async fn create_non_food(
        &self,
        body: impl Into<RequestBody>,
    ) -> Result<Option<Value>, ApiError> {
        let template = RequestSpec::post("").with_body(body);
        resolve(&self.transport, &non_food_paths(None), &template).await
    }

    pub async fn update_non_food(
        &self,
        id: &str,
        body: impl Into<RequestBody>,
    ) -> Result<Option<Value>, ApiError> {
        let template = RequestSpec::put("").with_body(body);
        resolve(&self.transport, &non_food_paths(Some(id)), &template).await
    }

    pub async fn delete_non_food(&self, id: &str) -> Result<Option<Value>, ApiError> {
        resolve(
            &self.transport,
            &non_food_delete_paths(id),
            &RequestSpec::delete(""),
        )
        .await
    }

    // ==================== CASH ====================

    pub async fn cash_account(&self) -> Result<Option<Value>, ApiError> {
        self.get(CASH).await
    }
}

#[async_trait]
impl AuthApi for Gateway {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        Gateway::login(self, email, password).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        Gateway::logout(self).await.map(|_| ())
    }

    async fn register(&self, email: &str, name: &str, password: &str) -> Result<(), ApiError> {
        Gateway::register(self, email, name, password).await.map(|_| ())
    }

    async fn current_user(&self) -> Result<UserRecord, ApiError> {
        Gateway::current_user(self).await
    }
}
