// `m204 inventory`: browse and edit extracted M204 metadata.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use m204_common::inventory::fields::{get_field, get_nested_field};
use m204_common::inventory::policy::{detail_fields, nested_columns};
use m204_common::inventory::{editable_fields, InventoryItem, InventoryState, InventoryTab, ProcedureParameter};

use super::{block_on, cell, plural, Context};
use crate::client::ApiClient;

#[derive(Debug, Args)]
pub struct InventoryArgs {
    #[command(subcommand)]
    command: InventoryCommand,
}

#[derive(Debug, Subcommand)]
enum InventoryCommand {
    /// List one inventory tab
    List {
        project_id: String,
        /// db-files, procedures, variables or other-files
        #[arg(long, default_value = "db-files")]
        tab: InventoryTab,
        /// Match on name or the tab's secondary field
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show every field of one item
    Show {
        project_id: String,
        /// Item id or name
        item: String,
        #[arg(long, default_value = "db-files")]
        tab: InventoryTab,
    },
    /// Change editable fields of one item and save it
    Edit {
        project_id: String,
        /// Item id or name
        item: String,
        #[arg(long, default_value = "db-files")]
        tab: InventoryTab,
        /// FIELD=VALUE on the item itself
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        sets: Vec<Assignment>,
        /// INDEX.FIELD=VALUE on a nested entry (0-based index)
        #[arg(long = "set-nested", value_name = "INDEX.FIELD=VALUE", value_parser = parse_nested_assignment)]
        nested: Vec<NestedAssignment>,
    },
    /// Upload a PARMLIB member for a DB file and re-analyze it
    Parmlib {
        project_id: String,
        /// Name of the M204 DB file the member describes
        db_file_name: String,
        file: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Assignment {
    field: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NestedAssignment {
    index: usize,
    field: String,
    value: String,
}

fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let (field, value) = raw.split_once('=').ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok(Assignment { field: field.to_string(), value: value.to_string() })
}

fn parse_nested_assignment(raw: &str) -> Result<NestedAssignment, String> {
    let Assignment { field: path, value } = parse_assignment(raw)?;
    let (index, field) = path.split_once('.').ok_or_else(|| format!("expected INDEX.FIELD=VALUE, got `{raw}`"))?;
    let index = index.trim().parse().map_err(|_| format!("`{index}` is not a nested entry index"))?;
    Ok(NestedAssignment { index, field: field.trim().to_string(), value })
}

// ── Output shapes ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ItemList {
    pub tab: InventoryTab,
    pub label: &'static str,
    pub search: String,
    pub total: usize,
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub tab: InventoryTab,
    pub key: String,
    pub fields: Vec<DetailField>,
    pub nested_columns: Vec<&'static str>,
    pub nested_rows: Vec<Vec<Value>>,
    pub editable: Vec<&'static str>,
    pub editable_nested: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_statements: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ProcedureParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub item: InventoryItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailField {
    pub field: &'static str,
    pub label: &'static str,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParmlibReport {
    pub db_file_name: String,
    pub response: Value,
    pub db_file: Option<InventoryItem>,
}

// ── Commands ───────────────────────────────────────────────────────

pub fn run(args: InventoryArgs, ctx: &Context) -> Result<()> {
    match args.command {
        InventoryCommand::List { project_id, tab, search } => {
            let client = ctx.client()?;
            let state = block_on(load(&client, &project_id, tab))??;
            ctx.print(&list(state, search), format_list)
        }
        InventoryCommand::Show { project_id, item, tab } => {
            let client = ctx.client()?;
            let mut state = block_on(load(&client, &project_id, tab))??;
            select(&mut state, &item)?;
            let detail = state.selected_item().map(detail).context("selected item disappeared")?;
            ctx.print(&detail, format_detail)
        }
        InventoryCommand::Edit { project_id, item, tab, sets, nested } => {
            if sets.is_empty() && nested.is_empty() {
                bail!("nothing to change; pass --set FIELD=VALUE or --set-nested INDEX.FIELD=VALUE");
            }
            let client = ctx.client()?;
            let mut state = block_on(load(&client, &project_id, tab))??;
            select(&mut state, &item)?;
            apply_edits(&mut state, &sets, &nested)?;
            let saved = block_on(save(&client, &project_id, &mut state))??;
            ctx.print(&detail(&saved), format_detail)
        }
        InventoryCommand::Parmlib { project_id, db_file_name, file } => run_parmlib(ctx, &project_id, db_file_name, file),
    }
}

async fn load(client: &ApiClient, project_id: &str, tab: InventoryTab) -> Result<InventoryState> {
    let mut state = InventoryState::new();
    state.select_tab(tab);
    state.load_tab(tab, client.list_inventory(project_id, tab).await?);
    Ok(state)
}

/// Select by key, falling back to a case-insensitive name match.
fn select(state: &mut InventoryState, wanted: &str) -> Result<()> {
    let tab = state.active_tab();
    let key = state
        .items(tab)
        .iter()
        .find(|item| item.key() == wanted)
        .or_else(|| state.items(tab).iter().find(|item| item.name().eq_ignore_ascii_case(wanted)))
        .map(|item| item.key().to_string())
        .with_context(|| format!("no item `{wanted}` on the {} tab", tab.label()))?;
    state.select_item(&key)?;
    Ok(())
}

fn apply_edits(state: &mut InventoryState, sets: &[Assignment], nested: &[NestedAssignment]) -> Result<()> {
    state.begin_edit()?;
    for set in sets {
        state.edit_field(&set.field, &set.value)?;
    }
    for set in nested {
        state.edit_nested_field(set.index, &set.field, &set.value)?;
    }
    Ok(())
}

async fn save(client: &ApiClient, project_id: &str, state: &mut InventoryState) -> Result<InventoryItem> {
    let request = state.prepare_save()?;
    match client.save_inventory_item(project_id, &request).await {
        Ok(updated) => {
            let saved = state.commit_save(updated)?;
            info!(tab = %request.tab, item = %request.item_id, "saved inventory item");
            Ok(saved.clone())
        }
        Err(error) => {
            state.fail_save(format!("{error:#}"));
            Err(error)
        }
    }
}

fn run_parmlib(ctx: &Context, project_id: &str, db_file_name: String, file: PathBuf) -> Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| "PARMLIB".into());
    let client = ctx.client()?;
    let report = block_on(async {
        let response = client.upload_parmlib(project_id, &file_name, bytes, &db_file_name).await?;
        // The upload rewrites the DB file, so show the refetched copy.
        let state = load(&client, project_id, InventoryTab::DbFiles).await?;
        let db_file = state
            .items(InventoryTab::DbFiles)
            .iter()
            .find(|item| item.name().eq_ignore_ascii_case(&db_file_name))
            .cloned();
        anyhow::Ok(ParmlibReport { db_file_name: db_file_name.clone(), response, db_file })
    })??;
    ctx.print(&report, |report| match &report.db_file {
        Some(item) => format!(
            "Analyzed PARMLIB for {}\n{}",
            report.db_file_name,
            format_detail(&detail(item))
        ),
        None => format!("Analyzed PARMLIB for {}; the DB file is not listed yet", report.db_file_name),
    })
}

// ── Views ──────────────────────────────────────────────────────────

fn list(mut state: InventoryState, search: String) -> ItemList {
    let tab = state.active_tab();
    let total = state.items(tab).len();
    state.set_search(search);
    ItemList {
        tab,
        label: tab.label(),
        search: state.search().to_string(),
        total,
        items: state.visible_items().into_iter().cloned().collect(),
    }
}

fn detail(item: &InventoryItem) -> ItemDetail {
    let tab = item.tab();
    let fields = detail_fields(tab)
        .iter()
        .map(|&(field, label)| DetailField { field, label, value: get_field(item, field).unwrap_or(Value::Null) })
        .collect();
    let columns = nested_columns(tab);
    let nested_rows = (0..item.nested_len())
        .map(|index| {
            columns
                .iter()
                .map(|(field, _)| get_nested_field(item, index, field).unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    let image_statements = match item {
        InventoryItem::OtherFile(file) => file.image_statement_text(),
        _ => Vec::new(),
    };
    let (parameters, content) = match item {
        InventoryItem::Procedure(procedure) => (
            procedure.parsed_parameters.as_ref().map(|parsed| parsed.parameters.clone()).unwrap_or_default(),
            procedure.content.clone().filter(|text| !text.trim().is_empty()),
        ),
        _ => (Vec::new(), None),
    };
    ItemDetail {
        tab,
        key: item.key().to_string(),
        fields,
        nested_columns: columns.iter().map(|(_, label)| *label).collect(),
        nested_rows,
        editable: editable_fields(tab, false).to_vec(),
        editable_nested: editable_fields(tab, true).to_vec(),
        image_statements,
        parameters,
        content,
        item: item.clone(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".into(),
        Value::Bool(true) => "Yes".into(),
        Value::Bool(false) => "No".into(),
        Value::String(text) if text.is_empty() => "-".into(),
        Value::String(text) => text.clone(),
        Value::Array(values) if values.is_empty() => "-".into(),
        Value::Array(values) if values.iter().all(|value| !value.is_array() && !value.is_object()) => {
            values.iter().map(display_value).collect::<Vec<_>>().join(", ")
        }
        other => other.to_string(),
    }
}

fn format_list(list: &ItemList) -> String {
    if list.items.is_empty() {
        return if list.total == 0 {
            format!("No {} found. Run analysis first: m204 files analyze <PROJECT>", list.label)
        } else {
            format!("No {} match \"{}\".", list.label, list.search.trim())
        };
    }
    let mut lines = vec![format!("{}: {} of {}", list.label, list.items.len(), plural(list.total, "item"))];
    for item in &list.items {
        lines.push(format!(
            "  {} {} {}",
            cell(item.key(), 10),
            cell(item.name(), 30),
            item.sub_display().unwrap_or("-")
        ));
    }
    lines.join("\n")
}

fn format_detail(detail: &ItemDetail) -> String {
    let mut lines = vec![format!("{} ({})", detail.item.name(), detail.tab.label())];
    for field in &detail.fields {
        let marker = if detail.editable.contains(&field.field) { "*" } else { " " };
        lines.push(format!("  {marker}{} {}", cell(field.label, 24), display_value(&field.value)));
    }

    if !detail.nested_rows.is_empty() {
        lines.push(String::new());
        let header: Vec<String> = detail.nested_columns.iter().map(|label| cell(label, 16)).collect();
        lines.push(format!("  {}  {}", cell("#", 3), header.join(" ")));
        for (index, row) in detail.nested_rows.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|value| cell(&display_value(value), 16)).collect();
            lines.push(format!("  {}  {}", cell(&index.to_string(), 3), cells.join(" ")));
        }
    }

    if !detail.image_statements.is_empty() {
        lines.push(String::new());
        lines.extend(detail.image_statements.iter().flat_map(|block| block.lines().map(|line| format!("  {line}"))));
    }

    if !detail.parameters.is_empty() {
        lines.push(String::new());
        lines.push(format!("  {} {} {}", cell("Parameter", 16), cell("Data Type", 16), "Direction"));
        for parameter in &detail.parameters {
            lines.push(format!(
                "  {} {} {}",
                cell(&parameter.name, 16),
                cell(parameter.data_type.as_deref().unwrap_or("-"), 16),
                parameter.direction.as_deref().unwrap_or("-"),
            ));
        }
    }

    if let Some(content) = &detail.content {
        lines.push(String::new());
        lines.push("  Source:".into());
        lines.extend(content.lines().map(|line| format!("    {line}")));
    }

    if !detail.editable.is_empty() || !detail.editable_nested.is_empty() {
        lines.push(String::new());
        lines.push("  * editable with --set".into());
        if !detail.editable_nested.is_empty() {
            lines.push(format!("  nested fields editable with --set-nested: {}", detail.editable_nested.join(", ")));
        }
    }
    lines.join("\n")
}
