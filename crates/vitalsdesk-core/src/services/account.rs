//! Console account endpoints under `/auth`.
//!
//! None of these touch cached entities, so they provide and invalidate no tags.

use serde_json::Value;

use crate::api::{arg_str, ApiError, RequestSpec};
use crate::cache::{CacheError, EndpointDescriptor};
use crate::models::{
    AuthProfile, ChangePasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
    UpdateProfileRequest,
};

use super::VitalsApi;

pub const REGISTER: &str = "register";
pub const LOGIN: &str = "login";
pub const GET_PROFILE: &str = "getProfile";
pub const UPDATE_PROFILE: &str = "updateProfile";
pub const CHANGE_PASSWORD: &str = "changePassword";

fn register_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["auth", "register"]).with_body(args.clone()))
}

fn login_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["auth", "login"]).with_body(args.clone()))
}

fn get_profile_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let email = arg_str(args, "email")?;
    Ok(RequestSpec::get(&["auth", "profile"]).with_query("email", email))
}

fn update_profile_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::put(&["auth", "profile"]).with_body(args.clone()))
}

fn change_password_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["auth", "change-password"]).with_body(args.clone()))
}

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::mutation(REGISTER, register_request),
        EndpointDescriptor::mutation(LOGIN, login_request),
        EndpointDescriptor::query(GET_PROFILE, get_profile_request),
        EndpointDescriptor::mutation(UPDATE_PROFILE, update_profile_request),
        EndpointDescriptor::mutation(CHANGE_PASSWORD, change_password_request),
    ]
}

impl VitalsApi {
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthProfile, CacheError> {
        self.store().mutate_as(REGISTER, request).await
    }

    /// Authenticate. The returned profile carries a token when the backend issues one.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthProfile, CacheError> {
        self.store().mutate_as(LOGIN, request).await
    }

    pub async fn get_profile(&self, email: &str) -> Result<AuthProfile, CacheError> {
        self.store().query_as(GET_PROFILE, email).await
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<AuthProfile, CacheError> {
        self.store().mutate_as(UPDATE_PROFILE, request).await
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, CacheError> {
        self.store().mutate_as(CHANGE_PASSWORD, request).await
    }
}
