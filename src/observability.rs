use std::net::SocketAddr;

use crate::command::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: console commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "dormrota_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "dormrota_command_duration_seconds";

/// Counter: generation passes. Labels: status.
pub const GENERATIONS_TOTAL: &str = "dormrota_generations_total";

/// Histogram: generation pass latency in seconds.
pub const GENERATION_DURATION_SECONDS: &str = "dormrota_generation_duration_seconds";

/// Counter: assignment rows written by generation passes.
pub const ASSIGNMENTS_GENERATED_TOTAL: &str = "dormrota_assignments_generated_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "dormrota_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "dormrota_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "dormrota_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "dormrota_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metrics label for a command.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SemesterAdd { .. } => "semester_add",
        Command::SemesterActivate { .. } => "semester_activate",
        Command::SemesterActive => "semester_active",
        Command::SemesterList => "semester_list",
        Command::RoomAdd { .. } => "room_add",
        Command::RoomUpdate { .. } => "room_update",
        Command::RoomList => "room_list",
        Command::AreaAdd { .. } => "area_add",
        Command::AreaUpdate { .. } => "area_update",
        Command::AreaSetActive { .. } => "area_set_active",
        Command::AreaDelete { .. } => "area_delete",
        Command::AreaList { .. } => "area_list",
        Command::WeekEnsure { .. } => "week_ensure",
        Command::WeekRest { .. } => "week_rest",
        Command::WeekShow { .. } => "week_show",
        Command::Generate { .. } => "generate",
        Command::Assign { .. } => "assign",
        Command::Clear { .. } => "clear",
        Command::ExceptionSet { .. } => "exception_set",
        Command::ExceptionRemove { .. } => "exception_remove",
        Command::ExceptionList { .. } => "exception_list",
        Command::History => "history",
        Command::Compact => "compact",
    }
}
