//! Data models for the health-tracking backend.
//!
//! This module contains the wire types exchanged with the REST API:
//!
//! - `AuthProfile`, `Role`: console accounts from `/auth/*`
//! - `User`: LINE users keyed by `lineId`
//! - `HealthRecord`: health metric entries from `/records`
//! - `RichMenu`: LINE rich menus from `/line/rich-menu`
//! - `SystemConfig`: key-value settings from `/system-configs`

pub mod account;
pub mod line;
pub mod record;
pub mod system_config;
pub mod user;

pub use account::{
    AuthProfile, ChangePasswordRequest, LoginRequest, MessageResponse, RegisterRequest, Role,
    UpdateProfileRequest,
};
pub use line::{CreateRichMenuRequest, RichMenu, RichMenuImage, RichMenuSize, WebhookRequest};
pub use record::{CreateRecordRequest, DateRange, HealthRecord, UpdateRecordRequest};
pub use system_config::{
    ConfigValueType, CreateSystemConfigRequest, SystemConfig, UpdateSystemConfigRequest,
};
pub use user::{CreateUserRequest, UpdateUserRequest, User};
