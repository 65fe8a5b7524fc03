use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use ulid::Ulid;

use crate::access::Actor;
use crate::command::{parse_command, Command, CommandError};
use crate::engine::{Engine, EngineError};
use crate::observability::{command_label, COMMANDS_TOTAL, COMMAND_DURATION_SECONDS};
use crate::tenant::{SemesterResolver, TenantManager};

/// Executes operator commands for one tenant on behalf of one actor.
pub struct Console {
    tenants: Arc<TenantManager>,
    tenant: String,
    actor: Actor,
}

impl Console {
    pub fn new(tenants: Arc<TenantManager>, tenant: impl Into<String>, actor: Actor) -> Self {
        Self {
            tenants,
            tenant: tenant.into(),
            actor,
        }
    }

    /// Parse and run one input line. Blank and comment lines produce no output;
    /// every other line produces exactly one JSON document.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let cmd = match parse_command(line) {
            Ok(cmd) => cmd,
            Err(CommandError::Empty) => return None,
            Err(e) => {
                metrics::counter!(COMMANDS_TOTAL, "command" => "unparsed", "status" => "error")
                    .increment(1);
                return Some(error_json(&e));
            }
        };

        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute(cmd).await;
        metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(value) => {
                metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "ok").increment(1);
                Some(value)
            }
            Err(e) => {
                metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "error")
                    .increment(1);
                tracing::debug!("{label} failed: {e}");
                Some(error_json(&e))
            }
        }
    }

    pub async fn execute(&self, cmd: Command) -> Result<Value, ConsoleError> {
        let engine = self.engine()?;
        let actor = &self.actor;

        let value = match cmd {
            Command::SemesterAdd { name, starts_on, ends_on } => {
                let semester = engine
                    .create_semester(actor, Ulid::new(), name, starts_on, ends_on)
                    .await?;
                serde_json::to_value(semester)?
            }
            Command::SemesterActivate { id } => {
                engine.activate_semester(actor, id).await?;
                json!({ "activated": id })
            }
            Command::SemesterActive => serde_json::to_value(engine.active_semester().await?)?,
            Command::SemesterList => serde_json::to_value(engine.list_semesters().await)?,

            Command::RoomAdd { label, level, capacity, position } => {
                let room = engine
                    .create_room(actor, Ulid::new(), label, capacity, level, position)
                    .await?;
                serde_json::to_value(room)?
            }
            Command::RoomUpdate { id, patch } => {
                serde_json::to_value(engine.update_room(actor, id, patch).await?)?
            }
            Command::RoomList => serde_json::to_value(engine.list_rooms().await)?,

            Command::AreaAdd { name, position } => {
                let area = engine.create_area(actor, Ulid::new(), name, position).await?;
                serde_json::to_value(area)?
            }
            Command::AreaUpdate { id, patch } => {
                serde_json::to_value(engine.update_area(actor, id, patch).await?)?
            }
            Command::AreaSetActive { id, active } => {
                serde_json::to_value(engine.set_area_active(actor, id, active).await?)?
            }
            Command::AreaDelete { id } => {
                engine.delete_area(actor, id).await?;
                json!({ "deleted": id })
            }
            Command::AreaList { include_inactive } => {
                serde_json::to_value(engine.list_areas(include_inactive).await)?
            }

            Command::WeekEnsure { date, rest_level } => {
                let semester = self.semester().await?;
                serde_json::to_value(engine.ensure_week(actor, semester, date, rest_level).await?)?
            }
            Command::WeekRest { week_id, rest_level } => {
                serde_json::to_value(engine.set_week_rest_level(actor, week_id, rest_level).await?)?
            }
            Command::WeekShow { date } => {
                let semester = self.semester().await?;
                serde_json::to_value(engine.week_view(actor, semester, date).await?)?
            }

            Command::Generate { date, rest_level } => {
                let semester = self.semester().await?;
                let generation = engine
                    .generate_assignments(actor, semester, date, rest_level)
                    .await?;
                serde_json::to_value(generation)?
            }
            Command::Assign { week_id, room_id, area_id } => {
                serde_json::to_value(engine.assign_room(actor, week_id, room_id, area_id).await?)?
            }
            Command::Clear { week_id, room_id } => {
                let cleared = engine.clear_assignment(actor, week_id, room_id).await?;
                json!({ "cleared": cleared })
            }

            Command::ExceptionSet { date, reason } => {
                let semester = self.semester().await?;
                serde_json::to_value(engine.upsert_exception(actor, semester, date, reason).await?)?
            }
            Command::ExceptionRemove { date } => {
                let semester = self.semester().await?;
                let removed = engine.remove_exception(actor, semester, date).await?;
                json!({ "removed": removed })
            }
            Command::ExceptionList { from, to } => {
                let semester = self.semester().await?;
                serde_json::to_value(engine.list_exceptions(semester, from, to).await)?
            }

            Command::History => serde_json::to_value(engine.assignment_history().await)?,
            Command::Compact => {
                actor.require_manage()?;
                engine.compact_wal().await?;
                json!({ "compacted": true })
            }
        };
        Ok(value)
    }

    fn engine(&self) -> Result<Arc<Engine>, ConsoleError> {
        Ok(self.tenants.get_or_create(&self.tenant)?)
    }

    async fn semester(&self) -> Result<Ulid, ConsoleError> {
        Ok(self.tenants.resolve_semester(&self.tenant).await?)
    }
}

fn error_json(e: &dyn std::fmt::Display) -> Value {
    json!({ "error": e.to_string() })
}

#[derive(Debug)]
pub enum ConsoleError {
    Command(CommandError),
    Engine(EngineError),
    Tenant(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleError::Command(e) => write!(f, "{e}"),
            ConsoleError::Engine(e) => write!(f, "{e}"),
            ConsoleError::Tenant(e) => write!(f, "tenant error: {e}"),
            ConsoleError::Json(e) => write!(f, "encode error: {e}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl From<CommandError> for ConsoleError {
    fn from(e: CommandError) -> Self {
        ConsoleError::Command(e)
    }
}

impl From<EngineError> for ConsoleError {
    fn from(e: EngineError) -> Self {
        ConsoleError::Engine(e)
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(e: std::io::Error) -> Self {
        ConsoleError::Tenant(e)
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Json(e)
    }
}
