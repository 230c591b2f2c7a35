//! Plain-text tables for terminal output.

use serde::Serialize;
use vitalsdesk_core::cache::EntrySnapshot;
use vitalsdesk_core::models::{AuthProfile, HealthRecord, RichMenu, SystemConfig, User};
use vitalsdesk_core::utils::{format_date, format_optional, truncate_string};

// ============================================================================
// Constants
// ============================================================================

/// Widest a free-text column may get before truncation.
const MAX_TEXT_WIDTH: usize = 40;

/// Column-aligned table built row by row.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let mut out = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| h.to_string()).collect();
        push_line(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        if self.rows.is_empty() {
            out.push_str("(none)\n");
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    out.push_str(padded.join("  ").trim_end());
    out.push('\n');
}

fn metric(value: Option<f64>) -> String {
    format_optional(&value, "-")
}

pub fn users_table(users: &[User]) -> String {
    let mut table = Table::new(&["LINE ID", "NAME", "BIRTHDAY", "GENDER", "HEIGHT", "ILLNESSES"]);
    for user in users {
        table.row(vec![
            user.line_id.clone(),
            truncate_string(&user.name, MAX_TEXT_WIDTH),
            user.birthday.as_deref().map(format_date).unwrap_or_else(|| "-".into()),
            format_optional(&user.gender, "-"),
            format_optional(&user.height, "-"),
            truncate_string(&user.display_illnesses(), MAX_TEXT_WIDTH),
        ]);
    }
    table.render()
}

pub fn records_table(records: &[HealthRecord]) -> String {
    let mut table = Table::new(&[
        "ID", "USER", "DATE", "WEIGHT", "HBA1C", "SUGAR", "BP", "LDL", "HDL", "TG",
    ]);
    for record in records {
        table.row(vec![
            record.id.clone(),
            record.user_id.clone(),
            format_date(&record.record_date),
            metric(record.weight),
            metric(record.hba1c),
            metric(record.blood_sugar),
            record.blood_pressure(),
            metric(record.ldl),
            metric(record.hdl),
            metric(record.tg),
        ]);
    }
    table.render()
}

pub fn configs_table(configs: &[SystemConfig]) -> String {
    let mut table = Table::new(&["KEY", "VALUE", "TYPE", "ACTIVE", "DESCRIPTION"]);
    for config in configs {
        table.row(vec![
            config.key.clone(),
            truncate_string(&config.value, MAX_TEXT_WIDTH),
            format_optional(&config.value_type, "string"),
            if config.active() { "yes" } else { "no" }.to_string(),
            truncate_string(config.description.as_deref().unwrap_or("-"), MAX_TEXT_WIDTH),
        ]);
    }
    table.render()
}

pub fn rich_menus_table(menus: &[RichMenu]) -> String {
    let mut table = Table::new(&["ID", "NAME", "SIZE", "SELECTED", "CHAT BAR", "AREAS"]);
    for menu in menus {
        table.row(vec![
            menu.id.clone(),
            truncate_string(&menu.name, MAX_TEXT_WIDTH),
            format!("{}x{}", menu.size.width, menu.size.height),
            if menu.selected { "yes" } else { "no" }.to_string(),
            truncate_string(&menu.chat_bar_text, MAX_TEXT_WIDTH),
            menu.areas.len().to_string(),
        ]);
    }
    table.render()
}

pub fn profile_block(profile: &AuthProfile) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name:       {}\n", profile.name));
    out.push_str(&format!("Email:      {}\n", profile.email));
    out.push_str(&format!("Role:       {}\n", profile.role));
    out.push_str(&format!(
        "Last login: {}\n",
        profile.last_login_at.as_deref().map(format_date).unwrap_or_else(|| "-".into())
    ));
    out
}

pub fn cache_table(entries: &[(EntrySnapshot, Vec<String>)]) -> String {
    let mut table = Table::new(&["KEY", "STATUS", "FETCHED", "SUBS", "STALE", "TAGS"]);
    for (entry, tags) in entries {
        table.row(vec![
            truncate_string(&entry.key.to_string(), MAX_TEXT_WIDTH),
            entry.status.to_string(),
            entry.age_display(),
            entry.subscriber_count.to_string(),
            if entry.is_stale { "yes" } else { "no" }.to_string(),
            truncate_string(&tags.join(" "), MAX_TEXT_WIDTH),
        ]);
    }
    table.render()
}

pub fn json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
