//! Command handlers. Each one runs through the shared `VitalsApi`.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use vitalsdesk_core::api::ApiClient;
use vitalsdesk_core::auth::{AuthState, Session, SessionData};
use vitalsdesk_core::cache::{EntrySnapshot, Subscription};
use vitalsdesk_core::config::{Config, ENV_API_BASE};
use vitalsdesk_core::models::{
    ChangePasswordRequest, CreateRecordRequest, CreateRichMenuRequest, CreateSystemConfigRequest,
    CreateUserRequest, DateRange, HealthRecord, LoginRequest, RegisterRequest, RichMenu,
    RichMenuImage,
    SystemConfig, UpdateRecordRequest, UpdateSystemConfigRequest, UpdateUserRequest, User,
    WebhookRequest,
};
use vitalsdesk_core::VitalsApi;

use crate::cli::{
    Command, ConfigCommand, RecordCommand, RecordMetrics, RichMenuCommand, UserCommand,
    UserFields, WatchArgs, WatchTarget,
};
use crate::output;

/// Everything a command needs: settings, session and the API facade.
pub struct Context {
    pub config: Config,
    pub session: Session,
    pub auth: AuthState,
    pub api: VitalsApi,
    pub json: bool,
}

impl Context {
    pub fn new(mut config: Config, base_url: Option<String>, json: bool) -> Result<Self> {
        if let Some(base) = base_url {
            config.api_base_url = Some(base);
        }
        let base = config.api_base_url().to_string();
        if base.starts_with('/') {
            let config_path = Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "config.json".to_string());
            bail!(
                "API base URL '{}' is relative. Pass --base-url, set {} or api_base_url in {}",
                base,
                ENV_API_BASE,
                config_path
            );
        }

        let mut session = Session::new(config.cache_dir()?);
        if let Err(e) = session.load() {
            warn!(error = %e, "Failed to load session");
        }

        let auth = AuthState::new();
        match config.token {
            Some(ref token) => auth.set_token(token.clone()),
            None => {
                if !session.apply_to(&auth) {
                    debug!("No saved session, requests go out unauthenticated");
                }
            }
        }

        let client = ApiClient::new(&base, auth.clone(), config.request_timeout())
            .context("Failed to create API client")?;
        let api = VitalsApi::connect(Arc::new(client), config.store_config())?;
        info!(base_url = %base, "Console ready");

        Ok(Self {
            config,
            session,
            auth,
            api,
            json,
        })
    }

    fn print<T: Serialize>(&self, value: &T, table: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", output::json(value)?);
        } else {
            print!("{}", table(value));
        }
        Ok(())
    }

    fn session_email(&self) -> Option<String> {
        self.session
            .data
            .as_ref()
            .map(|d| d.email.clone())
            .or_else(|| self.config.last_email.clone())
    }
}

pub async fn run(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => login(ctx, email).await,
        Command::Logout => logout(ctx),
        Command::Register { email, name, role } => {
            let password = prompt_new_password()?;
            let profile = ctx
                .api
                .register(&RegisterRequest {
                    email,
                    password,
                    name,
                    role,
                })
                .await
                .context("Registration failed")?;
            ctx.print(&profile, output::profile_block)
        }
        Command::Profile { email } => {
            let email = email
                .or_else(|| ctx.session_email())
                .ok_or_else(|| anyhow!("No account given. Pass --email or log in first"))?;
            let profile = ctx.api.get_profile(&email).await?;
            ctx.print(&profile, output::profile_block)
        }
        Command::ChangePassword => change_password(ctx).await,
        Command::Users(command) => users(ctx, command).await,
        Command::Records(command) => records(ctx, command).await,
        Command::Configs(command) => configs(ctx, command).await,
        Command::RichMenu(command) => rich_menus(ctx, command).await,
        Command::Webhook { file } => {
            let payload: WebhookRequest = read_json(&file)?;
            let events = payload.events.len();
            ctx.api.handle_webhook(&payload).await?;
            println!("Forwarded {} webhook event(s)", events);
            Ok(())
        }
        Command::Watch(args) => watch(ctx, args).await,
        Command::Cache => cache(ctx).await,
    }
}

// ===== Account =====

async fn login(ctx: &mut Context, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    if email.is_empty() || password.is_empty() {
        bail!("Email and password required");
    }

    let profile = ctx
        .api
        .login(&LoginRequest {
            email: email.clone(),
            password,
        })
        .await
        .context("Login failed")?;

    // Persist only what the file had plus the email; env overrides stay out.
    let mut stored = Config::load_from(&Config::config_path()?)?;
    stored.last_email = Some(email);
    if let Err(e) = stored.save() {
        warn!(error = %e, "Failed to save config");
    }

    match SessionData::from_profile(&profile) {
        Some(data) => {
            ctx.session.update(data);
            if let Err(e) = ctx.session.save() {
                warn!(error = %e, "Failed to save session");
            }
            ctx.session.apply_to(&ctx.auth);
        }
        None => warn!("Backend issued no token; later requests go out unauthenticated"),
    }

    println!("Logged in as {} ({})", profile.name, profile.role);
    Ok(())
}

fn logout(ctx: &mut Context) -> Result<()> {
    ctx.session.clear().context("Failed to clear session")?;
    ctx.auth.clear();
    println!("Logged out");
    Ok(())
}

async fn change_password(ctx: &Context) -> Result<()> {
    let email = ctx
        .session_email()
        .ok_or_else(|| anyhow!("Not logged in"))?;
    let old_password = rpassword::prompt_password("Current password: ")?;
    let new_password = prompt_new_password()?;
    let response = ctx
        .api
        .change_password(&ChangePasswordRequest {
            email,
            old_password,
            new_password,
        })
        .await
        .context("Password change failed")?;
    println!("{}", response.message);
    Ok(())
}

// ===== Users =====

async fn users(ctx: &Context, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::List => {
            let users = ctx.api.get_users().await?;
            ctx.print(&users, |u| output::users_table(u))
        }
        UserCommand::Get { line_id } => {
            let user = ctx.api.get_user_by_line_id(&line_id).await?;
            ctx.print(&user, |u| output::users_table(std::slice::from_ref(u)))
        }
        UserCommand::Create { line_id, fields } => {
            let name = fields
                .name
                .clone()
                .ok_or_else(|| anyhow!("--name is required"))?;
            let request = CreateUserRequest {
                line_id,
                name,
                birthday: fields.birthday,
                gender: fields.gender,
                height: fields.height,
                chronic_illness: non_empty(fields.illnesses),
            };
            let user = ctx.api.create_user(&request).await?;
            ctx.print(&user, |u| output::users_table(std::slice::from_ref(u)))
        }
        UserCommand::Update { line_id, fields } => {
            let user = ctx
                .api
                .update_user(&line_id, &user_update(fields))
                .await?;
            ctx.print(&user, |u| output::users_table(std::slice::from_ref(u)))
        }
        UserCommand::Delete { line_id } => {
            ctx.api.delete_user(&line_id).await?;
            println!("Deleted user {}", line_id);
            Ok(())
        }
    }
}

fn user_update(fields: UserFields) -> UpdateUserRequest {
    UpdateUserRequest {
        name: fields.name,
        birthday: fields.birthday,
        gender: fields.gender,
        height: fields.height,
        chronic_illness: non_empty(fields.illnesses),
    }
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

// ===== Records =====

async fn records(ctx: &Context, command: RecordCommand) -> Result<()> {
    match command {
        RecordCommand::List { user, from, to } => {
            let records = match (user, from, to) {
                (Some(user_id), Some(start_date), Some(end_date)) => {
                    let range = DateRange {
                        user_id,
                        start_date,
                        end_date,
                    };
                    ctx.api.get_records_by_date_range(&range).await?
                }
                (Some(user_id), _, _) => ctx.api.get_records_by_user_id(&user_id).await?,
                (None, _, _) => ctx.api.get_records().await?,
            };
            ctx.print(&records, |r| output::records_table(r))
        }
        RecordCommand::Get { id } => {
            let record = ctx.api.get_record_by_id(&id).await?;
            ctx.print(&record, |r| output::records_table(std::slice::from_ref(r)))
        }
        RecordCommand::Latest { user } => match ctx.api.get_latest_record_by_user_id(&user).await? {
            Some(record) => ctx.print(&record, |r| output::records_table(std::slice::from_ref(r))),
            None => {
                println!("No records for {}", user);
                Ok(())
            }
        },
        RecordCommand::Create { user, metrics } => {
            let update = record_fields(metrics);
            let request = CreateRecordRequest {
                user_id: user,
                weight: update.weight,
                hba1c: update.hba1c,
                blood_sugar: update.blood_sugar,
                systolic_pressure: update.systolic_pressure,
                diastolic_pressure: update.diastolic_pressure,
                ldl: update.ldl,
                hdl: update.hdl,
                tg: update.tg,
                record_date: update.record_date,
            };
            let record = ctx.api.create_record(&request).await?;
            ctx.print(&record, |r| output::records_table(std::slice::from_ref(r)))
        }
        RecordCommand::Update { id, metrics } => {
            let record = ctx.api.update_record(&id, &record_fields(metrics)).await?;
            ctx.print(&record, |r| output::records_table(std::slice::from_ref(r)))
        }
        RecordCommand::Delete { id } => {
            ctx.api.delete_record(&id).await?;
            println!("Deleted record {}", id);
            Ok(())
        }
    }
}

fn record_fields(metrics: RecordMetrics) -> UpdateRecordRequest {
    UpdateRecordRequest {
        weight: metrics.weight,
        hba1c: metrics.hba1c,
        blood_sugar: metrics.blood_sugar,
        systolic_pressure: metrics.systolic,
        diastolic_pressure: metrics.diastolic,
        ldl: metrics.ldl,
        hdl: metrics.hdl,
        tg: metrics.tg,
        record_date: metrics.date,
    }
}

// ===== System configs =====

async fn configs(ctx: &Context, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::List => {
            let configs = ctx.api.get_system_configs().await?;
            ctx.print(&configs, |c| output::configs_table(c))
        }
        ConfigCommand::Get { key } => {
            let config = ctx.api.get_system_config(&key).await?;
            ctx.print(&config, |c| output::configs_table(std::slice::from_ref(c)))
        }
        ConfigCommand::Create {
            key,
            value,
            value_type,
            description,
            inactive,
        } => {
            let request = CreateSystemConfigRequest {
                key,
                value,
                description,
                value_type,
                is_active: inactive.then_some(false),
            };
            let config = ctx.api.create_system_config(&request).await?;
            ctx.print(&config, |c| output::configs_table(std::slice::from_ref(c)))
        }
        ConfigCommand::Update {
            key,
            value,
            value_type,
            description,
            active,
        } => {
            let request = UpdateSystemConfigRequest {
                value,
                description,
                value_type,
                is_active: active,
            };
            let config = ctx.api.update_system_config(&key, &request).await?;
            ctx.print(&config, |c| output::configs_table(std::slice::from_ref(c)))
        }
        ConfigCommand::Delete { key } => {
            ctx.api.delete_system_config(&key).await?;
            println!("Deleted config {}", key);
            Ok(())
        }
    }
}

// ===== LINE =====

async fn rich_menus(ctx: &Context, command: RichMenuCommand) -> Result<()> {
    match command {
        RichMenuCommand::List => {
            let menus = ctx.api.get_rich_menus().await?;
            ctx.print(&menus, |m| output::rich_menus_table(m))
        }
        RichMenuCommand::Create { file } => {
            let request: CreateRichMenuRequest = read_json(&file)?;
            let menu = ctx.api.create_rich_menu(&request).await?;
            ctx.print(&menu, |m| output::rich_menus_table(std::slice::from_ref(m)))
        }
        RichMenuCommand::Upload { id, file } => {
            let image = read_image(&id, &file)?;
            let size = image.data.len();
            ctx.api.upload_rich_menu_image(&image).await?;
            println!("Uploaded {} ({} bytes) to rich menu {}", image.file_name, size, id);
            Ok(())
        }
        RichMenuCommand::SetDefault { id } => {
            ctx.api.set_default_rich_menu(&id).await?;
            println!("Rich menu {} is now the default", id);
            Ok(())
        }
        RichMenuCommand::Delete { id } => {
            ctx.api.delete_rich_menu(&id).await?;
            println!("Deleted rich menu {}", id);
            Ok(())
        }
    }
}

// ===== Watch & cache =====

async fn watch(ctx: &Context, args: WatchArgs) -> Result<()> {
    let mut subscription: Subscription = match (args.target, args.user.as_deref()) {
        (WatchTarget::Records, Some(user)) => ctx.api.subscribe_records_by_user_id(user)?,
        (WatchTarget::Records, None) => ctx.api.subscribe_records()?,
        (WatchTarget::Users, _) => ctx.api.subscribe_users()?,
        (WatchTarget::Configs, _) => ctx.api.subscribe_system_configs()?,
        (WatchTarget::RichMenus, _) => ctx.api.subscribe_rich_menus()?,
    };
    info!(key = %subscription.key(), interval = args.interval, "Watching");

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = subscription.changed() => {
                let snapshot = changed?;
                if snapshot.is_settled() {
                    print_snapshot(ctx, args.target, &snapshot)?;
                }
            }
            _ = ticker.tick() => {
                subscription.refetch()?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }
    subscription.unsubscribe();
    Ok(())
}

fn print_snapshot(ctx: &Context, target: WatchTarget, snapshot: &EntrySnapshot) -> Result<()> {
    if let Some(ref err) = snapshot.error {
        eprintln!("{} refresh failed: {}", snapshot.key, err);
        if snapshot.data.is_none() {
            return Ok(());
        }
    }
    if !ctx.json {
        println!("\n== {} (updated {}) ==", snapshot.key.endpoint, snapshot.age_display());
    }
    match target {
        WatchTarget::Users => print_data::<Vec<User>>(ctx, snapshot, |u| output::users_table(u)),
        WatchTarget::Records => {
            print_data::<Vec<HealthRecord>>(ctx, snapshot, |r| output::records_table(r))
        }
        WatchTarget::Configs => {
            print_data::<Vec<SystemConfig>>(ctx, snapshot, |c| output::configs_table(c))
        }
        WatchTarget::RichMenus => {
            print_data::<Vec<RichMenu>>(ctx, snapshot, |m| output::rich_menus_table(m))
        }
    }
}

fn print_data<T: DeserializeOwned + Serialize>(
    ctx: &Context,
    snapshot: &EntrySnapshot,
    table: impl FnOnce(&T) -> String,
) -> Result<()> {
    match snapshot.data_as::<T>()? {
        Some(data) => ctx.print(&data, table),
        None => Ok(()),
    }
}

async fn cache(ctx: &Context) -> Result<()> {
    let (users, records, configs) = tokio::join!(
        ctx.api.get_users(),
        ctx.api.get_records(),
        ctx.api.get_system_configs(),
    );
    for (name, failed) in [
        ("users", users.err()),
        ("records", records.err()),
        ("configs", configs.err()),
    ] {
        if let Some(err) = failed {
            warn!(list = name, error = %err, "Failed to load list");
        }
    }

    let store = ctx.api.store();
    let entries: Vec<(EntrySnapshot, Vec<String>)> = store
        .entries()
        .into_iter()
        .map(|entry| {
            let tags = store
                .tags_for(&entry.key)
                .iter()
                .map(ToString::to_string)
                .collect();
            (entry, tags)
        })
        .collect();
    print!("{}", output::cache_table(&entries));
    Ok(())
}

// ===== Prompts & files =====

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_image(rich_menu_id: &str, path: &Path) -> Result<RichMenuImage> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
    Ok(RichMenuImage::new(rich_menu_id, file_name, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fields_map_cli_names() {
        let update = record_fields(RecordMetrics {
            systolic: Some(120.0),
            diastolic: Some(80.0),
            date: Some("2024-03-01".into()),
            ..RecordMetrics::default()
        });
        assert_eq!(update.systolic_pressure, Some(120.0));
        assert_eq!(update.diastolic_pressure, Some(80.0));
        assert_eq!(update.record_date.as_deref(), Some("2024-03-01"));
        assert_eq!(update.weight, None);
    }

    #[test]
    fn test_user_update_skips_empty_illnesses() {
        let update = user_update(UserFields {
            name: Some("Somchai".into()),
            ..UserFields::default()
        });
        assert_eq!(update.name.as_deref(), Some("Somchai"));
        assert!(update.chronic_illness.is_none());

        let update = user_update(UserFields {
            illnesses: vec!["diabetes".into()],
            ..UserFields::default()
        });
        assert_eq!(update.chronic_illness, Some(vec!["diabetes".to_string()]));
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let err = Context::new(Config::default(), None, false)
            .err()
            .expect("relative default base should be refused");
        assert!(err.to_string().contains("relative"));
    }
}
