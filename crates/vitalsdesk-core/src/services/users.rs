//! LINE user endpoints under `/users`, keyed by `lineId`.

use serde::de::IgnoredAny;
use serde_json::Value;

use crate::api::{arg_field, arg_str, ApiError, RequestSpec};
use crate::cache::{CacheError, EndpointDescriptor, Subscription, Tag};
use crate::models::{CreateUserRequest, UpdateUserRequest, User};

use super::{UpdateArgs, VitalsApi, USER};

pub const GET_USERS: &str = "getUsers";
pub const GET_USER_BY_LINE_ID: &str = "getUserByLineId";
pub const CREATE_USER: &str = "createUser";
pub const UPDATE_USER: &str = "updateUser";
pub const DELETE_USER: &str = "deleteUser";

fn get_users_request(_: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["users"]))
}

fn get_user_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["users", arg_str(args, "lineId")?]))
}

fn create_user_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["users"]).with_body(args.clone()))
}

fn update_user_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let line_id = arg_str(args, "id")?;
    let data = arg_field(args, "data")?;
    Ok(RequestSpec::patch(&["users", line_id]).with_body(data.clone()))
}

fn delete_user_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::delete(&["users", arg_str(args, "lineId")?]))
}

fn user_type(_: &Value, _: &Value) -> Vec<Tag> {
    vec![Tag::of(USER)]
}

fn user_by_line_id(_: &Value, args: &Value) -> Vec<Tag> {
    arg_str(args, "lineId")
        .map(|id| vec![Tag::id(USER, id)])
        .unwrap_or_default()
}

fn user_updated(_: &Value, args: &Value) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(2);
    if let Ok(id) = arg_str(args, "id") {
        tags.push(Tag::id(USER, id));
    }
    tags.push(Tag::of(USER));
    tags
}

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::query(GET_USERS, get_users_request).providing(user_type),
        EndpointDescriptor::query(GET_USER_BY_LINE_ID, get_user_request).providing(user_by_line_id),
        EndpointDescriptor::mutation(CREATE_USER, create_user_request).invalidating(user_type),
        EndpointDescriptor::mutation(UPDATE_USER, update_user_request).invalidating(user_updated),
        EndpointDescriptor::mutation(DELETE_USER, delete_user_request).invalidating(user_type),
    ]
}

impl VitalsApi {
    pub async fn get_users(&self) -> Result<Vec<User>, CacheError> {
        self.store().query_as(GET_USERS, ()).await
    }

    pub async fn get_user_by_line_id(&self, line_id: &str) -> Result<User, CacheError> {
        self.store().query_as(GET_USER_BY_LINE_ID, line_id).await
    }

    pub fn subscribe_users(&self) -> Result<Subscription, CacheError> {
        self.store().subscribe(GET_USERS, ())
    }

    pub fn subscribe_user(&self, line_id: &str) -> Result<Subscription, CacheError> {
        self.store().subscribe(GET_USER_BY_LINE_ID, line_id)
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, CacheError> {
        self.store().mutate_as(CREATE_USER, request).await
    }

    pub async fn update_user(&self, line_id: &str, data: &UpdateUserRequest) -> Result<User, CacheError> {
        self.store()
            .mutate_as(UPDATE_USER, UpdateArgs { id: line_id, data })
            .await
    }

    pub async fn delete_user(&self, line_id: &str) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(DELETE_USER, line_id)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use serde_json::json;

    #[test]
    fn test_update_splits_id_and_body() {
        let args = json!({"id": "line123", "data": {"name": "Somchai"}});
        let spec = update_user_request(&args).expect("request");
        assert_eq!(spec.method, Method::Patch);
        assert_eq!(spec.display_path(), "/users/line123");
        assert_eq!(spec.body, Some(json!({"name": "Somchai"})));
        assert_eq!(
            user_updated(&Value::Null, &args),
            vec![Tag::id(USER, "line123"), Tag::of(USER)]
        );
    }

    #[test]
    fn test_update_without_data_is_invalid() {
        let err = update_user_request(&json!({"id": "line123"})).expect_err("missing data");
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_detail_tag_scoped_to_line_id() {
        assert_eq!(
            user_by_line_id(&json!({"lineId": "line123"}), &json!("line123")),
            vec![Tag::id(USER, "line123")]
        );
        assert!(user_by_line_id(&Value::Null, &Value::Null).is_empty());
    }

    #[test]
    fn test_delete_path() {
        let spec = delete_user_request(&json!("line123")).expect("request");
        assert_eq!(spec.method, Method::Delete);
        assert_eq!(spec.segments, vec!["users", "line123"]);
    }
}
