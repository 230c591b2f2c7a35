//! LINE messaging endpoints under `/line`.

use serde::de::IgnoredAny;
use serde_json::{json, Value};

use crate::api::{arg_str, ApiError, FileUpload, RequestSpec};
use crate::cache::{CacheError, EndpointDescriptor, Subscription, Tag};
use crate::models::{CreateRichMenuRequest, RichMenu, RichMenuImage, WebhookRequest};

use super::{VitalsApi, RICH_MENU};

pub const HANDLE_WEBHOOK: &str = "handleWebhook";
pub const CREATE_RICH_MENU: &str = "createRichMenu";
pub const GET_RICH_MENU: &str = "getRichMenu";
pub const UPLOAD_RICH_MENU_IMAGE: &str = "uploadRichMenuImage";
pub const SET_DEFAULT_RICH_MENU: &str = "setDefaultRichMenu";
pub const DELETE_RICH_MENU: &str = "deleteRichMenu";

fn webhook_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["line", "webhook"]).with_body(args.clone()))
}

fn create_rich_menu_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::post(&["line", "rich-menu"]).with_body(args.clone()))
}

fn get_rich_menu_request(_: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::get(&["line", "rich-menu"]))
}

fn upload_image_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let image: RichMenuImage = serde_json::from_value(args.clone())
        .map_err(|e| ApiError::InvalidRequest(format!("invalid image upload: {}", e)))?;
    Ok(RequestSpec::post(&["line", "rich-menu", "upload"])
        .with_header("rich-menu-id", image.rich_menu_id)
        .with_upload(FileUpload {
            field: "image".to_string(),
            file_name: image.file_name,
            content_type: image.content_type,
            bytes: image.data,
        }))
}

fn set_default_request(args: &Value) -> Result<RequestSpec, ApiError> {
    let rich_menu_id = arg_str(args, "richMenuId")?;
    Ok(RequestSpec::post(&["line", "rich-menu", "default"])
        .with_body(json!({ "richMenuId": rich_menu_id })))
}

fn delete_rich_menu_request(args: &Value) -> Result<RequestSpec, ApiError> {
    Ok(RequestSpec::delete(&["line", "rich-menu", arg_str(args, "richMenuId")?]))
}

fn rich_menu_type(_: &Value, _: &Value) -> Vec<Tag> {
    vec![Tag::of(RICH_MENU)]
}

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::mutation(HANDLE_WEBHOOK, webhook_request),
        EndpointDescriptor::mutation(CREATE_RICH_MENU, create_rich_menu_request)
            .invalidating(rich_menu_type),
        EndpointDescriptor::query(GET_RICH_MENU, get_rich_menu_request).providing(rich_menu_type),
        EndpointDescriptor::mutation(UPLOAD_RICH_MENU_IMAGE, upload_image_request)
            .invalidating(rich_menu_type),
        EndpointDescriptor::mutation(SET_DEFAULT_RICH_MENU, set_default_request)
            .invalidating(rich_menu_type),
        EndpointDescriptor::mutation(DELETE_RICH_MENU, delete_rich_menu_request)
            .invalidating(rich_menu_type),
    ]
}

impl VitalsApi {
    pub async fn handle_webhook(&self, request: &WebhookRequest) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(HANDLE_WEBHOOK, request)
            .await
            .map(|_| ())
    }

    pub async fn create_rich_menu(&self, request: &CreateRichMenuRequest) -> Result<RichMenu, CacheError> {
        self.store().mutate_as(CREATE_RICH_MENU, request).await
    }

    pub async fn get_rich_menus(&self) -> Result<Vec<RichMenu>, CacheError> {
        self.store().query_as(GET_RICH_MENU, ()).await
    }

    pub fn subscribe_rich_menus(&self) -> Result<Subscription, CacheError> {
        self.store().subscribe(GET_RICH_MENU, ())
    }

    pub async fn upload_rich_menu_image(&self, image: &RichMenuImage) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(UPLOAD_RICH_MENU_IMAGE, image)
            .await
            .map(|_| ())
    }

    pub async fn set_default_rich_menu(&self, rich_menu_id: &str) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(SET_DEFAULT_RICH_MENU, rich_menu_id)
            .await
            .map(|_| ())
    }

    pub async fn delete_rich_menu(&self, rich_menu_id: &str) -> Result<(), CacheError> {
        self.store()
            .mutate_as::<IgnoredAny, _>(DELETE_RICH_MENU, rich_menu_id)
            .await
            .map(|_| ())
    }
}
