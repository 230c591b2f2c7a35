//! Key-value system settings under `/system-configs`.

use serde::de::IgnoredAny;
use serde_json::Value;

use crate::api::{arg_field, arg_str, ApiError, RequestSpec};
use crate::cache::{CacheError, EndpointDescriptor, Subscription, Tag};
use crate::models::{CreateSystemConfigRequest, SystemConfig, UpdateSystemConfigRequest};

use super::{UpdateArgs, VitalsApi, SYSTEM_CONFIG};

pub const GET_SYSTEM_CONFIGS: &str = "getSystemConfigs";
pub const GET_SYSTEM_CONFIG_BY_KEY: &str = "getSystemConfigByKey";
pub const CREATE_SYSTEM_CONFIG: &str = "createSystemConfig";
pub const UPDATE_SYSTEM_CONFIG: &str = "updateSystemConfig";
pub const DELETE_SYSTEM_CONFIG: &str = "deleteSystemConfig";

fn get_configs_request(_: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["system-configs"]))
}

fn get_config_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["system-configs", arg_str(args, "key")?]))
}

fn create_config_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["system-configs"]).with_body(args.clone()))
}

fn update_config_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let key = arg_str(args, "id")?;
    let data = arg_field(args, "data")?;
    Ok(RequestSpec::put(&["system-configs", key]).with_body(data.clone()))
}

fn delete_config_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::delete(&["system-configs", arg_str(args, "key")?]))
}

fn config_type(_: &Value, _: &Value) -> Vec<Tag> {
    vec![Tag::of(SYSTEM_CONFIG)]
}

fn config_by_key(_: &Value, args: &Value) -> Vec<Tag> {
    arg_str(args, "key")
        .map(|key| vec![Tag::id(SYSTEM_CONFIG, key)])
        .unwrap_or_default()
}

/// `{SystemConfig, key}` plus the bare type. Updates carry the key under `id`.
fn config_changed(_: &Value, args: &Value) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(2);
    let key = arg_str(args, "key").or_else(|_| arg_str(args, "id"));
    if let Ok(key) = key {
        tags.push(Tag::id(SYSTEM_CONFIG, key));
    }
    tags.push(Tag::of(SYSTEM_CONFIG));
    tags
}

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::query(GET_SYSTEM_CONFIGS, get_configs_request).providing(config_type),
        EndpointDescriptor::query(GET_SYSTEM_CONFIG_BY_KEY, get_config_request)
            .providing(config_by_key),
        EndpointDescriptor::mutation(CREATE_SYSTEM_CONFIG, create_config_request)
            .invalidating(config_type),
        EndpointDescriptor::mutation(UPDATE_SYSTEM_CONFIG, update_config_request)
            .invalidating(config_changed),
        EndpointDescriptor::mutation(DELETE_SYSTEM_CONFIG, delete_config_request)
            .invalidating(config_changed),
    ]
}

impl VitalsApi {
    pub async fn get_system_configs(&self) -> Result<Vec<SystemConfig>, CacheError> {
        self.store().query_as(GET_SYSTEM_CONFIGS, ()).await
    }

    pub async fn get_system_config(&self, key: &str) -> Result<SystemConfig, CacheError> {
        self.store().query_as(GET_SYSTEM_CONFIG_BY_KEY, key).await
    }

    pub fn subscribe_system_configs(&self) -> Result<Subscription, CacheError> {
        self.store().subscribe(GET_SYSTEM_CONFIGS, ())
    }

    pub async fn create_system_config(
        &self,
        request: &CreateSystemConfigRequest,
    ) -> Result<SystemConfig, CacheError> {
        self.store().mutate_as(CREATE_SYSTEM_CONFIG, request).await
    }

    pub async fn update_system_config(
        &self,
        key: &str,
        data: &UpdateSystemConfigRequest,
    ) -> Result<SystemConfig, CacheError> {
        self.store()
            .mutate_as(UPDATE_SYSTEM_CONFIG, UpdateArgs { id: key, data })
            .await
    }

    pub async fn delete_system_config(&self, key: &str) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(DELETE_SYSTEM_CONFIG, key)
            .await
            .map(|_| ())
    }
}
