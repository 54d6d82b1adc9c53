use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod classify;
mod config;
mod consolidate;
mod db;
mod error;
mod excel;
mod format;
mod ingest;
mod logging;
mod models;
mod pdf;
mod report;
mod resolver;
mod session;

use crate::config::AppConfig;
use crate::format::TemplateSet;
use crate::models::{CustomerInfo, Fixture, ReportImage};
use crate::report::ReportView;
use crate::session::ReportSession;

#[derive(Parser)]
#[command(name = "retrofit-report")]
#[command(about = "Water conservation retrofit installation reports", long_about = None)]
struct Cli {
    /// Session file holding the report being edited
    #[arg(long, global = true, default_value = "report-session.json")]
    session: PathBuf,
    /// TOML file with per-renderer format templates
    #[arg(long, global = true)]
    templates: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the report store schema
    InitDb,
    /// Load installation rows from a spreadsheet (.xlsx or CSV)
    Import {
        #[arg(long, visible_alias = "csv")]
        file: PathBuf,
    },
    /// Print the consolidated per-unit detail view
    Show,
    /// Render the report to PDF and/or Excel
    #[command(group(
        ArgGroup::new("output")
            .args(["pdf", "xlsx"])
            .required(true)
            .multiple(true)
    ))]
    Export {
        #[arg(long)]
        pdf: Option<PathBuf>,
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
    /// Save the session to the report store
    Save {
        #[arg(long)]
        title: Option<String>,
    },
    /// Replace the session with a stored report
    Load {
        #[arg(long)]
        id: Uuid,
    },
    /// List the most recent stored reports
    List,
    /// Caption uncaptioned photos with the vision classifier
    Caption,
    /// Edit the session
    Edit {
        #[command(subcommand)]
        edit: EditCommand,
    },
}

#[derive(Subcommand)]
enum EditCommand {
    /// Set a fixture cell's display text; omit VALUE to clear
    Override {
        unit: String,
        fixture: Fixture,
        value: Option<String>,
    },
    /// Set a unit's note text; omit TEXT to clear
    Note { unit: String, text: Option<String> },
    /// Show a unit under a different id
    RenameUnit { unit: String, display: String },
    /// Rename a spreadsheet column before resolution
    RenameColumn { from: String, to: String },
    /// Toggle a column as a note source
    SelectColumn { column: String },
    /// Toggle a single cell (zero-based row) as a note source
    SelectCell { row: usize, column: String },
    /// Attach a photo to a unit
    AddImage {
        unit: String,
        path: PathBuf,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Set customer details; omitted fields keep their current value
    Customer {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        property: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        zip: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Set the free-text notes printed with the summary
    ReportNotes { text: String },
    /// Override the toilet total shown in the summary; 0 uses the computed total
    ToiletCount { count: u32 },
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config.database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

fn load_templates(path: Option<&Path>) -> anyhow::Result<TemplateSet> {
    match path {
        Some(path) => TemplateSet::load(path)
            .with_context(|| format!("failed to load templates from {}", path.display())),
        None => Ok(TemplateSet::default()),
    }
}

fn save_session(session: &ReportSession, path: &Path) -> anyhow::Result<()> {
    session
        .save(path)
        .with_context(|| format!("failed to write session {}", path.display()))
}

fn apply_edit(session: &mut ReportSession, edit: EditCommand) -> anyhow::Result<String> {
    let message = match edit {
        EditCommand::Override {
            unit,
            fixture,
            value,
        } => {
            let cleared = value.is_none();
            session.set_override(&unit, fixture, value);
            if cleared {
                format!("Cleared {} override for {unit}.", fixture.heading())
            } else {
                format!("Set {} override for {unit}.", fixture.heading())
            }
        }
        EditCommand::Note { unit, text } => {
            let cleared = text.is_none();
            session.set_note(&unit, text);
            if cleared {
                format!("Cleared note override for {unit}.")
            } else {
                format!("Set note for {unit}.")
            }
        }
        EditCommand::RenameUnit { unit, display } => {
            session.rename_unit(&unit, &display);
            format!("{unit} now shows as {}.", session.display_unit(&unit))
        }
        EditCommand::RenameColumn { from, to } => {
            session.rename_column(&from, &to)?;
            format!("Column '{from}' renamed to '{to}'.")
        }
        EditCommand::SelectColumn { column } => {
            if session.toggle_note_column(&column) {
                format!("Column '{column}' added to notes.")
            } else {
                format!("Column '{column}' removed from notes.")
            }
        }
        EditCommand::SelectCell { row, column } => {
            if session.toggle_note_cell(row, &column)? {
                format!("Cell {row}/'{column}' added to notes.")
            } else {
                format!("Cell {row}/'{column}' removed from notes.")
            }
        }
        EditCommand::AddImage {
            unit,
            path,
            caption,
            url,
        } => {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .with_context(|| format!("{} is not a file path", path.display()))?;
            session.add_image(ReportImage {
                unit: unit.clone(),
                file_name: file_name.clone(),
                path: Some(path.display().to_string()),
                caption,
                url,
            });
            format!("Added {file_name} to {unit}.")
        }
        EditCommand::Customer {
            name,
            property,
            address,
            city,
            state,
            zip,
            date,
        } => {
            let customer = session.customer_info.get_or_insert_with(CustomerInfo::default);
            let fields = [
                (&mut customer.customer_name, name),
                (&mut customer.property_name, property),
                (&mut customer.address, address),
                (&mut customer.city, city),
                (&mut customer.state, state),
                (&mut customer.zip, zip),
            ];
            for (field, value) in fields {
                if let Some(value) = value {
                    *field = value.trim().to_string();
                }
            }
            if date.is_some() {
                customer.date = date;
            }
            "Customer information updated.".to_string()
        }
        EditCommand::ReportNotes { text } => {
            session.report_notes = text;
            "Report notes updated.".to_string()
        }
        EditCommand::ToiletCount { count } => {
            session.toilet_count = count;
            format!("Toilet count set to {count}.")
        }
    };
    Ok(message)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let session_path = cli.session.as_path();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { file } => {
            let rows = ingest::read_spreadsheet(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let mut session = ReportSession::load_or_default(session_path);
            session.installation_data = rows;
            // row indexes refer to the previous import
            session.note_selection.cells.clear();
            save_session(&session, session_path)?;

            let view = ReportView::build(&session)?;
            println!(
                "Imported {} rows from {} into {} units.",
                session.installation_data.len(),
                file.display(),
                view.units().len()
            );
        }
        Commands::Show => {
            let templates = load_templates(cli.templates.as_deref())?;
            let session = ReportSession::load_or_default(session_path);
            let view = ReportView::build(&session)?;
            print!("{}", report::build_detail_view(&view, &templates.detail));
        }
        Commands::Export { pdf, xlsx } => {
            let templates = load_templates(cli.templates.as_deref())?;
            let session = ReportSession::load_or_default(session_path);
            let customer = session.ensure_exportable()?;
            let view = ReportView::build(&session)?;

            if let Some(out) = pdf {
                let bytes = pdf::render_to_bytes(&view, customer, &templates.pdf)?;
                std::fs::write(&out, bytes)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("PDF written to {}.", out.display());
            }
            if let Some(out) = xlsx {
                let bytes =
                    excel::ExcelRenderer::new(templates.excel).render_to_bytes(&view, customer)?;
                std::fs::write(&out, bytes)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Workbook written to {}.", out.display());
            }
        }
        Commands::Save { title } => {
            let mut session = ReportSession::load_or_default(session_path);
            let title = title.or_else(|| {
                Some(session.title.clone()).filter(|t| !t.trim().is_empty())
            });
            let data = session.to_report_data(Utc::now());

            let pool = connect(&config).await?;
            let outcome = db::save_report(&pool, session.report_id, title.as_deref(), &data).await;
            match (outcome.success, outcome.id) {
                (true, Some(id)) => {
                    session.report_id = Some(id);
                    session.title = db::resolve_title(title.as_deref(), &data);
                    save_session(&session, session_path)?;
                    println!("Report saved as {id}.");
                }
                _ => {
                    anyhow::bail!(outcome
                        .message
                        .unwrap_or_else(|| "report was not saved".to_string()));
                }
            }
        }
        Commands::Load { id } => {
            let pool = connect(&config).await?;
            let (title, data) = db::load_report(&pool, id).await?;
            let session = ReportSession::from_report_data(id, &title, data);
            save_session(&session, session_path)?;
            println!("Loaded '{title}' into {}.", session_path.display());
        }
        Commands::List => {
            let pool = connect(&config).await?;
            let reports = db::list_reports(&pool).await?;
            if reports.is_empty() {
                println!("No saved reports.");
                return Ok(());
            }
            for report in reports {
                println!(
                    "- {} {} ({})",
                    report.id,
                    report.title,
                    report.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Caption => {
            let mut session = ReportSession::load_or_default(session_path);
            let classifier = classify::VisionClassifier::new(
                config.vision_api_url.clone(),
                config.vision_api_key.clone(),
                config.vision_model.clone(),
            );
            let captioned =
                classify::caption_images(&mut session.images, &classifier, config.caption_delay)
                    .await;
            save_session(&session, session_path)?;
            println!("Captioned {captioned} of {} photos.", session.images.len());
        }
        Commands::Edit { edit } => {
            let mut session = ReportSession::load_or_default(session_path);
            let message = apply_edit(&mut session, edit)?;
            save_session(&session, session_path)?;
            println!("{message}");
        }
    }

    Ok(())
}
