//! Health record endpoints under `/records`.
//!
//! Lists scoped to a user provide `{Record, LIST}` plus one `{Record, _id}`
//! tag per item, so editing a single record refreshes every list that
//! contains it. The latest-record view provides `{Record, LATEST}`.

use serde::de::IgnoredAny;
use serde_json::Value;

use crate::api::{arg_field, arg_str, ApiError, RequestSpec};
use crate::cache::{CacheError, EndpointDescriptor, Subscription, Tag};
use crate::models::{CreateRecordRequest, DateRange, HealthRecord, UpdateRecordRequest};

use super::{list_tags, UpdateArgs, VitalsApi, RECORD};

pub const GET_RECORDS: &str = "getRecords";
pub const GET_RECORD_BY_ID: &str = "getRecordById";
pub const GET_RECORDS_BY_USER_ID: &str = "getRecordsByUserId";
pub const GET_RECORDS_BY_DATE_RANGE: &str = "getRecordsByDateRange";
pub const GET_LATEST_RECORD_BY_USER_ID: &str = "getLatestRecordByUserId";
pub const CREATE_RECORD: &str = "createRecord";
pub const UPDATE_RECORD: &str = "updateRecord";
pub const DELETE_RECORD: &str = "deleteRecord";

fn get_records_request(_: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["records"]))
}

fn get_record_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["records", arg_str(args, "id")?]))
}

fn by_user_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["records", "user", arg_str(args, "userId")?]))
}

fn date_range_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let user_id = arg_field(args, "userId")?
        .as_str()
        .ok_or_else(|| ApiError::InvalidRequest("'userId' must be a string".into()))?;
    let start = arg_field(args, "startDate")?
        .as_str()
        .ok_or_else(|| ApiError::InvalidRequest("'startDate' must be a string".into()))?;
    let end = arg_field(args, "endDate")?
        .as_str()
        .ok_or_else(|| ApiError::InvalidRequest("'endDate' must be a string".into()))?;
    Ok(RequestSpec::get(&["records", "user", user_id, "date-range"])
        .with_query("startDate", start)
        .with_query("endDate", end))
}

fn latest_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["records", "user", arg_str(args, "userId")?, "latest"]))
}

fn create_record_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["records"]).with_body(args.clone()))
}

fn update_record_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let id = arg_str(args, "id")?;
    let data = arg_field(args, "data")?;
    Ok(RequestSpec::patch(&["records", id]).with_body(data.clone()))
}

fn delete_record_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::delete(&["records", arg_str(args, "id")?]))
}

fn record_type(_: &Value, _: &Value) -> Vec<Tag> {
    vec![Tag::of(RECORD)]
}

fn record_by_id(_: &Value, args: &Value) -> Vec<Tag> {
    arg_str(args, "id")
        .map(|id| vec![Tag::id(RECORD, id)])
        .unwrap_or_default()
}

fn record_list(result: &Value, _: &Value) -> Vec<Tag> {
    list_tags(RECORD, result, "_id")
}

fn record_latest(result: &Value, _: &Value) -> Vec<Tag> {
    let mut tags = vec![Tag::latest(RECORD)];
    if let Some(id) = result.get("_id").and_then(Value::as_str) {
        tags.push(Tag::id(RECORD, id));
    }
    tags
}

fn record_updated(_: &Value, args: &Value) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(2);
    if let Ok(id) = arg_str(args, "id") {
        tags.push(Tag::id(RECORD, id));
    }
    tags.push(Tag::of(RECORD));
    tags
}

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::query(GET_RECORDS, get_records_request).providing(record_type),
        EndpointDescriptor::query(GET_RECORD_BY_ID, get_record_request).providing(record_by_id),
        EndpointDescriptor::query(GET_RECORDS_BY_USER_ID, by_user_request).providing(record_list),
        EndpointDescriptor::query(GET_RECORDS_BY_DATE_RANGE, date_range_request)
            .providing(record_list),
        EndpointDescriptor::query(GET_LATEST_RECORD_BY_USER_ID, latest_request)
            .providing(record_latest),
        EndpointDescriptor::mutation(CREATE_RECORD, create_record_request).invalidating(record_type),
        EndpointDescriptor::mutation(UPDATE_RECORD, update_record_request)
            .invalidating(record_updated),
        EndpointDescriptor::mutation(DELETE_RECORD, delete_record_request).invalidating(record_type),
    ]
}

impl VitalsApi {
    pub async fn get_records(&self) -> Result<Vec<HealthRecord>, CacheError> {
        self.store().query_as(GET_RECORDS, ()).await
    }

    pub async fn get_record_by_id(&self, id: &str) -> Result<HealthRecord, CacheError> {
        self.store().query_as(GET_RECORD_BY_ID, id).await
    }

    pub async fn get_records_by_user_id(&self, user_id: &str) -> Result<Vec<HealthRecord>, CacheError> {
        self.store().query_as(GET_RECORDS_BY_USER_ID, user_id).await
    }

    pub async fn get_records_by_date_range(
        &self,
        range: &DateRange,
    ) -> Result<Vec<HealthRecord>, CacheError> {
        self.store().query_as(GET_RECORDS_BY_DATE_RANGE, range).await
    }

    /// Latest record for a user, or `None` when the backend answers with an empty body.
    pub async fn get_latest_record_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<HealthRecord>, CacheError> {
        self.store()
            .query_as(GET_LATEST_RECORD_BY_USER_ID, user_id)
            .await
    }

    pub fn subscribe_records(&self) -> Result<Subscription, CacheError> {
        self.store().subscribe(GET_RECORDS, ())
    }

    pub fn subscribe_records_by_user_id(&self, user_id: &str) -> Result<Subscription, CacheError> {
        self.store().subscribe(GET_RECORDS_BY_USER_ID, user_id)
    }

    pub async fn create_record(&self, request: &CreateRecordRequest) -> Result<HealthRecord, CacheError> {
        self.store().mutate_as(CREATE_RECORD, request).await
    }

    pub async fn update_record(
        &self,
        id: &str,
        data: &UpdateRecordRequest,
    ) -> Result<HealthRecord, CacheError> {
        self.store()
            .mutate_as(UPDATE_RECORD, UpdateArgs { id, data })
            .await
    }

    pub async fn delete_record(&self, id: &str) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(DELETE_RECORD, id)
            .await
            .map(|_| ())
    }
}
