//! Shared fixtures: in-memory executors standing in for the backend.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use vitalsdesk_core::api::{ApiError, FetchExecutor, Method, RequestSpec};
use vitalsdesk_core::cache::{QueryStore, StoreConfig};
use vitalsdesk_core::services::{self, VitalsApi};

pub type Reply = Result<Value, ApiError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

/// Executor answering from per-route scripts, keyed as `"GET /records"`.
///
/// Queued replies are used first, in order; after that the route's standing
/// reply applies. Unknown routes answer 404.
#[derive(Default)]
pub struct ScriptedExecutor {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    standing: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Standing reply for every call to `route`.
    pub fn always(&self, route: &str, reply: Reply) {
        self.standing.lock().unwrap().insert(route.to_string(), reply);
    }

    /// One-time reply, used before the standing one.
    pub fn once(&self, route: &str, reply: Reply) {
        self.push(route, Scripted::Ready(reply));
    }

    /// One-time reply held back until the returned sender fires.
    pub fn gate(&self, route: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(route, Scripted::Gated(rx));
        tx
    }

    fn push(&self, route: &str, scripted: Scripted) {
        self.queued
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(scripted);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, route: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == route).count()
    }
}

#[async_trait]
impl FetchExecutor for ScriptedExecutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, request: RequestSpec) -> Result<Value, ApiError> {
        let route = route(&request);
        self.calls.lock().unwrap().push(route.clone());

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".into()))),
            None => self
                .standing
                .lock()
                .unwrap()
                .get(&route)
                .cloned()
                .unwrap_or_else(|| Err(not_found(&route))),
        }
    }
}

pub fn route(request: &RequestSpec) -> String {
    format!("{} {}", request.method.as_str(), request.display_path())
}

pub fn not_found(what: &str) -> ApiError {
    ApiError::from_status(404, &json!({ "message": format!("{} not found", what) }).to_string())
}

/// Tiny stateful `/records` backend: list, by id, by user, create, delete.
#[derive(Default)]
pub struct RecordsBackend {
    records: Mutex<Vec<Value>>,
    next_id: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl RecordsBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, user_id: &str, weight: f64) -> String {
        self.insert(json!({ "userId": user_id, "weight": weight, "recordDate": "2024-03-01" }))
    }

    fn insert(&self, mut body: Value) -> String {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = format!("r{}", next_id);
        body["_id"] = json!(id);
        if body.get("recordDate").is_none() {
            body["recordDate"] = json!("2024-03-01");
        }
        self.records.lock().unwrap().push(body);
        id
    }

    pub fn calls_to(&self, route: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == route).count()
    }
}

#[async_trait]
impl FetchExecutor for RecordsBackend {
    fn name(&self) -> &'static str {
        "records-backend"
    }

    async fn execute(&self, request: RequestSpec) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(route(&request));
        let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["records"]) => Ok(Value::Array(self.records.lock().unwrap().clone())),
            (Method::Get, ["records", "user", user_id]) => Ok(Value::Array(
                self.records
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|r| r["userId"] == *user_id)
                    .cloned()
                    .collect(),
            )),
            (Method::Get, ["records", id]) => self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r["_id"] == *id)
                .cloned()
                .ok_or_else(|| not_found(id)),
            (Method::Post, ["records"]) => {
                let id = self.insert(request.body.clone().unwrap_or_else(|| json!({})));
                self.records
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|r| r["_id"] == id.as_str())
                    .cloned()
                    .ok_or_else(|| not_found(&id))
            }
            (Method::Patch, ["records", id]) => {
                let mut records = self.records.lock().unwrap();
                let record = records
                    .iter_mut()
                    .find(|r| r["_id"] == *id)
                    .ok_or_else(|| not_found(id))?;
                if let (Some(target), Some(Value::Object(patch))) =
                    (record.as_object_mut(), request.body.as_ref())
                {
                    for (field, value) in patch {
                        target.insert(field.clone(), value.clone());
                    }
                }
                Ok(record.clone())
            }
            (Method::Delete, ["records", id]) => {
                let mut records = self.records.lock().unwrap();
                let before = records.len();
                records.retain(|r| r["_id"] != *id);
                if records.len() == before {
                    return Err(not_found(id));
                }
                Ok(Value::Null)
            }
            _ => Err(not_found(&request.display_path())),
        }
    }
}

pub fn store_over(executor: Arc<dyn FetchExecutor>, keep_unused: Duration) -> QueryStore {
    let registry = services::registry().expect("endpoint table should be valid");
    QueryStore::init(executor, registry, StoreConfig::new(keep_unused))
}

pub fn api_over(executor: Arc<dyn FetchExecutor>) -> VitalsApi {
    VitalsApi::new(store_over(executor, Duration::from_secs(60)))
}

/// Let spawned fetch tasks run to their next await point.
pub async fn settle_tasks() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
