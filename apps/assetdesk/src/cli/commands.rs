//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::{Backend, Config, ServerConfig};
use crate::mailer::Mailer;
use crate::scheduler;
use assetdesk_core::{Desk, DeskError, DeskMetrics, registry_from_bytes};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum snapshot size accepted by `import` (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DeskError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DeskError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(DeskError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path: symlinks and `..` are resolved and the target
/// must be a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DeskError> {
    let canonical = path.canonicalize().map_err(|e| {
        DeskError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DeskError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, DeskError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        DeskError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(DeskError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| DeskError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server and the daily job scheduler.
pub async fn cmd_server(
    config: Config,
    db_path: &Path,
    backend: Backend,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), DeskError> {
    let mut desk = load_desk(db_path, backend)?;
    if let Some(recipients) = config.recipients() {
        desk.set_recipients(recipients)?;
    }

    let mailer = Mailer::new(&config.mail)?;
    let mut state = AppState::new(desk).with_mailer(mailer.clone());
    if backend == Backend::File {
        state = state.with_snapshot(db_path.to_path_buf());
        let desk = state.desk.read().await;
        state.persist(&desk).await?;
    }

    let server = ServerConfig {
        host: host.unwrap_or_else(|| config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
        ..config.server.clone()
    };

    println!("assetdesk server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", server.host);
    println!("  Port:      {}", server.port);
    println!("  Backend:   {}", backend.name());
    println!("  Database:  {}", db_path.display());
    println!(
        "  Mail:      {}",
        if mailer.is_configured() {
            "smtp"
        } else {
            "log only"
        }
    );
    println!(
        "  Auth:      {}",
        if server.api_key.is_some() {
            "api key"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Endpoints:");
    println!("  GET  /health            - Health check");
    println!("  GET  /status            - Dashboard counts");
    println!("  GET  /helpdesk          - Public ticket form");
    println!("  POST /allocations       - Create an allocation");
    println!("  POST /clearances        - Open an exit clearance");
    println!("  POST /jobs/run          - Run the daily jobs now");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let _scheduler = scheduler::spawn(state.clone(), &config.scheduler);
    api::run_server(state, &server).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show dashboard counts.
pub fn cmd_status(db_path: &Path, backend: Backend, json_mode: bool) -> Result<(), DeskError> {
    let desk = load_desk(db_path, backend)?;
    let metrics = desk.metrics();

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend.name(),
            "metrics": metrics,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("assetdesk Status");
    println!("================");
    println!("Database: {}", db_path.display());
    println!("Backend:  {}", backend.name());
    println!();
    print_metrics(&metrics);
    Ok(())
}

fn print_metrics(metrics: &DeskMetrics) {
    let assets = &metrics.assets;
    println!("Assets:        {}", assets.total);
    println!("  allocated:   {}", assets.allocated);
    println!("  unallocated: {}", assets.unallocated);
    println!("  scrapped:    {}", assets.scrapped);
    println!("  flagged:     {}", assets.flagged);
    for (class, count) in &assets.by_class {
        println!("  {:<12} {}", format!("{}:", class), count);
    }
    println!(
        "  value:       {}.{:02}",
        assets.value_cents / 100,
        (assets.value_cents % 100).abs()
    );
    println!();

    let rooms = &metrics.rooms;
    println!("Rooms:         {}", rooms.total);
    println!("  occupied:    {}", rooms.occupied);
    println!("  vacant:      {}", rooms.vacant);
    println!("  full:        {}", rooms.full);
    println!("  beds:        {} / {}", rooms.occupied_beds, rooms.beds);
    println!();

    println!("Allocations:");
    if metrics.allocations.is_empty() {
        println!("  (none)");
    }
    for (kind, states) in &metrics.allocations {
        let summary = states
            .iter()
            .map(|(state, count)| format!("{}={}", state, count))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {}: {}", kind, summary);
    }
    println!();

    println!("Pending checklists:     {}", metrics.pending_checklists);
    println!("Open follow-ups:        {}", metrics.open_follow_ups);
    println!("Open maintenance:       {}", metrics.open_maintenance);
    println!("Open tickets:           {}", metrics.open_tickets);
    println!("Queued notifications:   {}", metrics.queued_notifications);
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the registry as a snapshot (re-importable) or as JSON (read-only).
pub fn cmd_export(
    db_path: &Path,
    backend: Backend,
    output: &Path,
    format: &str,
) -> Result<(), DeskError> {
    let validated_output = validate_output_path(output)?;
    let desk = load_desk(db_path, backend)?;

    let data = match format {
        "snapshot" => desk.export_bytes()?,
        "json" => serde_json::to_vec_pretty(desk.registry())
            .map_err(|e| DeskError::SerializationError(e.to_string()))?,
        _ => {
            return Err(DeskError::Validation(format!(
                "Unknown format: {}. Use: snapshot, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| DeskError::IoError(format!("Write file: {}", e)))?;

    println!(
        "Exported {} bytes to {}",
        data.len(),
        validated_output.display()
    );
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Replace the stored registry with a snapshot file.
pub fn cmd_import(
    db_path: &Path,
    backend: Backend,
    input: &Path,
    json_mode: bool,
) -> Result<(), DeskError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| DeskError::IoError(format!("Read file: {}", e)))?;

    let mut desk = load_desk(db_path, backend)?;
    desk.import_bytes(&data)?;
    save_desk(&desk, db_path)?;

    let metrics = desk.metrics();
    if json_mode {
        let output = serde_json::json!({
            "imported_bytes": data.len(),
            "metrics": metrics,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!(
            "Imported registry: {} assets, {} rooms, {} allocations",
            metrics.assets.total,
            metrics.rooms.total,
            desk.registry().allocations.len()
        );
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty database.
pub fn cmd_init(db_path: &Path, backend: Backend, force: bool) -> Result<(), DeskError> {
    if db_path.exists() {
        if !force {
            return Err(DeskError::Conflict(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| DeskError::IoError(format!("Remove database: {}", e)))?;
    }

    match backend {
        Backend::Redb => {
            let _desk = Desk::with_redb(db_path)?;
            println!("Initialized new redb database at {}", db_path.display());
        }
        Backend::File => {
            save_desk(&Desk::new(), db_path)?;
            println!("Initialized new file database at {}", db_path.display());
        }
    }
    Ok(())
}

// =============================================================================
// JOBS COMMAND
// =============================================================================

/// Run the daily jobs once, as of `date` (midnight UTC) or now.
pub async fn cmd_jobs(
    config: &Config,
    db_path: &Path,
    backend: Backend,
    date: Option<NaiveDate>,
    json_mode: bool,
) -> Result<(), DeskError> {
    let mut desk = load_desk(db_path, backend)?;
    if let Some(recipients) = config.recipients() {
        desk.set_recipients(recipients)?;
    }

    let mut state = AppState::new(desk).with_mailer(Mailer::new(&config.mail)?);
    if backend == Backend::File {
        state = state.with_snapshot(db_path.to_path_buf());
    }

    let now = match date {
        Some(day) => DateTime::<Utc>::from_naive_utc_and_offset(day.and_time(NaiveTime::MIN), Utc),
        None => Utc::now(),
    };
    let (report, delivery) = scheduler::run_once(&state, now).await?;

    if json_mode {
        let output = serde_json::json!({
            "date": now.date_naive(),
            "expiry_alerts": report.expiry_alerts,
            "maintenance_requests": report.maintenance_requests,
            "sent": delivery.sent,
            "failed": delivery.failed,
            "logged": delivery.logged,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Daily jobs for {}", now.date_naive());
    println!("  Expiry alerts:        {}", report.expiry_alerts);
    println!(
        "  Maintenance requests: {}",
        report.maintenance_requests.len()
    );
    println!(
        "  Notifications:        {} sent, {} failed, {} logged",
        delivery.sent, delivery.failed, delivery.logged
    );
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the desk stored at `db_path`. A missing snapshot file starts empty.
pub fn load_desk(db_path: &Path, backend: Backend) -> Result<Desk, DeskError> {
    match backend {
        Backend::Redb => Desk::with_redb(db_path),
        Backend::File => {
            if !db_path.exists() {
                return Ok(Desk::new());
            }
            let data = std::fs::read(db_path)
                .map_err(|e| DeskError::IoError(format!("Read db: {}", e)))?;
            Ok(Desk::with_registry(registry_from_bytes(&data)?))
        }
    }
}

/// Write a file-backed desk back to disk. Redb desks are already durable.
pub fn save_desk(desk: &Desk, db_path: &Path) -> Result<(), DeskError> {
    if desk.is_persistent() {
        return Ok(());
    }
    let data = desk.export_bytes()?;
    std::fs::write(db_path, &data).map_err(|e| DeskError::IoError(format!("Write db: {}", e)))
}
