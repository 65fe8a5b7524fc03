use std::time::Instant;

use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::access::Actor;
use crate::calendar::{next_rest_level, now_ms, valid_rest_level, week_start_of};
use crate::limits::*;
use crate::model::*;
use crate::notify::Topic;
use crate::observability::{ASSIGNMENTS_GENERATED_TOTAL, GENERATIONS_TOTAL, GENERATION_DURATION_SECONDS};

use super::rotation::plan_rotation;
use super::store::RotaState;
use super::{Engine, EngineError};

/// Partial room update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPatch {
    pub label: Option<String>,
    pub capacity: Option<u32>,
    pub level: Option<i32>,
    pub position: Option<i32>,
}

/// Partial area update. Activation has its own call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaPatch {
    pub name: Option<String>,
    pub position: Option<i32>,
}

fn validate_name(name: &str, what: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!("{what} must not be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

/// Out-of-cycle levels are treated as "not supplied".
fn requested_level(requested: Option<i32>) -> Option<RestLevel> {
    let raw = requested?;
    let level = valid_rest_level(raw);
    if level.is_none() {
        tracing::debug!("ignoring rest level {raw}: outside 1..={MAX_REST_LEVEL}");
    }
    level
}

fn monday_of(date: NaiveDate) -> Result<NaiveDate, EngineError> {
    week_start_of(date)
        .ok_or_else(|| EngineError::InvalidInput(format!("{date} has no representable week")))
}

/// How a week resolves, computed before anything is written.
struct WeekPlan {
    week_id: Ulid,
    rest_level: Option<RestLevel>,
    event: Option<Event>,
}

fn plan_week(
    state: &RotaState,
    semester_id: Ulid,
    monday: NaiveDate,
    requested: Option<RestLevel>,
    now: Ms,
) -> Result<WeekPlan, EngineError> {
    if let Some(week) = state.week_for(semester_id, monday) {
        return Ok(match requested {
            Some(level) if week.rest_level != Some(level) => WeekPlan {
                week_id: week.id,
                rest_level: Some(level),
                event: Some(Event::WeekRestLevelSet {
                    id: week.id,
                    rest_level: level,
                    at: now,
                }),
            },
            _ => WeekPlan {
                week_id: week.id,
                rest_level: week.rest_level,
                event: None,
            },
        });
    }

    let semester = state
        .semester(&semester_id)
        .ok_or(EngineError::NotFound(semester_id))?;
    // A week belongs to the semester when any of its days falls inside it.
    let first_monday = week_start_of(semester.starts_on).unwrap_or(semester.starts_on);
    if monday < first_monday || monday > semester.ends_on {
        return Err(EngineError::InvalidInput(format!(
            "week of {monday} is outside semester {} ({} to {})",
            semester.name, semester.starts_on, semester.ends_on
        )));
    }
    let level = requested.unwrap_or_else(|| {
        let previous = state
            .previous_week(semester_id, monday)
            .and_then(|w| w.rest_level)
            .map(i32::from);
        next_rest_level(previous)
    });
    let id = Ulid::new();
    Ok(WeekPlan {
        week_id: id,
        rest_level: Some(level),
        event: Some(Event::WeekCreated {
            id,
            semester_id,
            week_start: monday,
            rest_level: Some(level),
            at: now,
        }),
    })
}

impl Engine {
    // ── Semesters ────────────────────────────────────────────

    pub async fn create_semester(
        &self,
        actor: &Actor,
        id: Ulid,
        name: String,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<Semester, EngineError> {
        actor.require_manage()?;
        validate_name(&name, "semester name")?;
        if ends_on < starts_on {
            return Err(EngineError::InvalidInput(format!(
                "semester ends ({ends_on}) before it starts ({starts_on})"
            )));
        }
        if ends_on.signed_duration_since(starts_on).num_days() > MAX_SEMESTER_DAYS {
            return Err(EngineError::LimitExceeded("semester too long"));
        }
        let mut state = self.state.write().await;
        if state.semester_count() >= MAX_SEMESTERS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many semesters"));
        }
        if state.semester(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::SemesterCreated { id, name, starts_on, ends_on };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await?;
        state.semester(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Make `id` the tenant's only active semester.
    pub async fn activate_semester(&self, actor: &Actor, id: Ulid) -> Result<(), EngineError> {
        actor.require_manage()?;
        let mut state = self.state.write().await;
        if state.semester(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::SemesterActivated { id };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await
    }

    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(
        &self,
        actor: &Actor,
        id: Ulid,
        label: String,
        capacity: u32,
        level: i32,
        position: i32,
    ) -> Result<Room, EngineError> {
        actor.require_manage()?;
        validate_name(&label, "room label")?;
        let mut state = self.state.write().await;
        if state.room_count() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if state.room(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::RoomCreated { id, label, capacity, level, position };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await?;
        state.room(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Capacity/level/position override.
    pub async fn update_room(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: RoomPatch,
    ) -> Result<Room, EngineError> {
        actor.require_manage()?;
        if let Some(ref label) = patch.label {
            validate_name(label, "room label")?;
        }
        let mut state = self.state.write().await;
        let current = state.room(&id).ok_or(EngineError::NotFound(id))?;
        let event = Event::RoomUpdated {
            id,
            label: patch.label.unwrap_or_else(|| current.label.clone()),
            capacity: patch.capacity.unwrap_or(current.capacity),
            level: patch.level.unwrap_or(current.level),
            position: patch.position.unwrap_or(current.position),
        };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await?;
        state.room(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    // ── Areas ────────────────────────────────────────────────

    pub async fn create_area(
        &self,
        actor: &Actor,
        id: Ulid,
        name: String,
        position: i32,
    ) -> Result<CleaningArea, EngineError> {
        actor.require_manage()?;
        validate_name(&name, "area name")?;
        let mut state = self.state.write().await;
        if state.area_count() >= MAX_AREAS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many areas"));
        }
        if state.area(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::AreaCreated { id, name, position, active: true };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await?;
        state.area(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn update_area(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: AreaPatch,
    ) -> Result<CleaningArea, EngineError> {
        actor.require_manage()?;
        if let Some(ref name) = patch.name {
            validate_name(name, "area name")?;
        }
        let mut state = self.state.write().await;
        let current = state.area(&id).ok_or(EngineError::NotFound(id))?;
        let event = Event::AreaUpdated {
            id,
            name: patch.name.unwrap_or_else(|| current.name.clone()),
            position: patch.position.unwrap_or(current.position),
            active: current.active,
        };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await?;
        state.area(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Soft enable/disable. Existing assignments to a disabled area stay until cleared.
    pub async fn set_area_active(
        &self,
        actor: &Actor,
        id: Ulid,
        active: bool,
    ) -> Result<CleaningArea, EngineError> {
        actor.require_manage()?;
        let mut state = self.state.write().await;
        let current = state.area(&id).ok_or(EngineError::NotFound(id))?;
        if current.active == active {
            return Ok(current.clone());
        }
        let event = Event::AreaUpdated {
            id,
            name: current.name.clone(),
            position: current.position,
            active,
        };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await?;
        state.area(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Remove an area and every assignment that references it, in every week.
    pub async fn delete_area(&self, actor: &Actor, id: Ulid) -> Result<(), EngineError> {
        actor.require_manage()?;
        let mut state = self.state.write().await;
        if state.area(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::AreaDeleted { id };
        self.persist_and_apply(&mut state, Topic::Roster, &event).await
    }

    // ── Weeks ────────────────────────────────────────────────

    /// Find or create the week containing `date`.
    ///
    /// A new week takes the requested level, else the level after the latest
    /// earlier week of the semester, else 1. An existing week is only changed
    /// when a different valid level is requested, which needs a manager.
    pub async fn ensure_week(
        &self,
        actor: &Actor,
        semester_id: Ulid,
        date: NaiveDate,
        requested_rest_level: Option<i32>,
    ) -> Result<CleaningWeek, EngineError> {
        let requested = requested_level(requested_rest_level);
        if requested.is_some() {
            actor.require_manage()?;
        }
        let monday = monday_of(date)?;

        {
            let state = self.state.read().await;
            if let Some(week) = state.week_for(semester_id, monday)
                && requested.is_none_or(|level| week.rest_level == Some(level))
            {
                return Ok(week.clone());
            }
        }

        // Re-check under the write lock: a concurrent caller may have created it.
        let mut state = self.state.write().await;
        if state.semester(&semester_id).is_none() {
            return Err(EngineError::NotFound(semester_id));
        }
        let plan = plan_week(&state, semester_id, monday, requested, now_ms())?;
        if let Some(event) = &plan.event {
            self.persist_and_apply(&mut state, Topic::Semester(semester_id), event)
                .await?;
            if matches!(event, Event::WeekCreated { .. }) {
                info!("created cleaning week {monday} with rest level {:?}", plan.rest_level);
            }
        }
        state.week(&plan.week_id).cloned().ok_or(EngineError::NotFound(plan.week_id))
    }

    /// Explicit manager override of a week's rest level.
    pub async fn set_week_rest_level(
        &self,
        actor: &Actor,
        week_id: Ulid,
        rest_level: i32,
    ) -> Result<CleaningWeek, EngineError> {
        actor.require_manage()?;
        let level = valid_rest_level(rest_level).ok_or_else(|| {
            EngineError::InvalidInput(format!("rest level must be 1..={MAX_REST_LEVEL}, got {rest_level}"))
        })?;
        let mut state = self.state.write().await;
        let week = state.week(&week_id).ok_or(EngineError::NotFound(week_id))?;
        if week.rest_level != Some(level) {
            let topic = Topic::Semester(week.semester_id);
            let event = Event::WeekRestLevelSet {
                id: week_id,
                rest_level: level,
                at: now_ms(),
            };
            self.persist_and_apply(&mut state, topic, &event).await?;
        }
        state.week(&week_id).cloned().ok_or(EngineError::NotFound(week_id))
    }

    // ── Generation ───────────────────────────────────────────

    /// Regenerate the whole assignment set of the week containing `date`.
    ///
    /// Preconditions are checked before anything is written, so a failed call
    /// leaves neither a new week nor any assignment behind.
    pub async fn generate_assignments(
        &self,
        actor: &Actor,
        semester_id: Ulid,
        date: NaiveDate,
        requested_rest_level: Option<i32>,
    ) -> Result<Generation, EngineError> {
        let started = Instant::now();
        let result = self
            .generate_inner(actor, semester_id, date, requested_rest_level)
            .await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(GENERATIONS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(GENERATION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        result
    }

    /// Same as `generate_assignments`, for the tenant's active semester.
    pub async fn generate_for_active_semester(
        &self,
        actor: &Actor,
        date: NaiveDate,
        requested_rest_level: Option<i32>,
    ) -> Result<Generation, EngineError> {
        actor.require_manage()?;
        let semester = self.active_semester().await?;
        self.generate_assignments(actor, semester.id, date, requested_rest_level)
            .await
    }

    async fn generate_inner(
        &self,
        actor: &Actor,
        semester_id: Ulid,
        date: NaiveDate,
        requested_rest_level: Option<i32>,
    ) -> Result<Generation, EngineError> {
        actor.require_manage()?;
        let requested = requested_level(requested_rest_level);
        let monday = monday_of(date)?;

        let mut state = self.state.write().await;
        if state.semester(&semester_id).is_none() {
            return Err(EngineError::NotFound(semester_id));
        }
        if state.areas_in_order(false).is_empty() {
            return Err(EngineError::NoActiveAreas);
        }

        let now = now_ms();
        let plan = plan_week(&state, semester_id, monday, requested, now)?;
        let rooms: Vec<Room> = state.rooms_in_order().into_iter().cloned().collect();
        let areas: Vec<CleaningArea> = state.areas_in_order(false).into_iter().cloned().collect();
        let history = state.history();
        let picks = plan_rotation(&rooms, &areas, &history, plan.rest_level)?;

        let topic = Topic::Semester(semester_id);
        if let Some(event) = &plan.event {
            self.persist_and_apply(&mut state, topic, event).await?;
        }
        let rows: Vec<AssignmentRow> = picks
            .iter()
            .map(|p| AssignmentRow {
                id: Ulid::new(),
                room_id: p.room_id,
                area_id: p.area_id,
            })
            .collect();
        let event = Event::AssignmentsReplaced {
            week_id: plan.week_id,
            rows,
            at: now,
        };
        self.persist_and_apply(&mut state, topic, &event).await?;

        let week = state
            .week(&plan.week_id)
            .cloned()
            .ok_or(EngineError::NotFound(plan.week_id))?;
        let created: Vec<CleaningAssignment> = state
            .assignments_for(&plan.week_id)
            .into_iter()
            .cloned()
            .collect();

        metrics::counter!(ASSIGNMENTS_GENERATED_TOTAL).increment(created.len() as u64);
        info!(
            "generated {} assignments for week {} (rest level {:?})",
            created.len(),
            week.week_start,
            week.rest_level
        );
        Ok(Generation { week, created })
    }

    // ── Manual assignments ───────────────────────────────────

    /// Give `room_id` the area `area_id` for the week, replacing any previous assignment.
    pub async fn assign_room(
        &self,
        actor: &Actor,
        week_id: Ulid,
        room_id: Ulid,
        area_id: Ulid,
    ) -> Result<CleaningAssignment, EngineError> {
        actor.require_manage()?;
        let mut state = self.state.write().await;
        let semester_id = state
            .week(&week_id)
            .ok_or(EngineError::NotFound(week_id))?
            .semester_id;
        if state.room(&room_id).is_none() {
            return Err(EngineError::NotFound(room_id));
        }
        let area = state.area(&area_id).ok_or(EngineError::NotFound(area_id))?;
        if !area.active {
            return Err(EngineError::InvalidInput(format!(
                "area {} is inactive: activate it first",
                area.name
            )));
        }
        let event = Event::AssignmentSet {
            id: Ulid::new(),
            week_id,
            room_id,
            area_id,
            at: now_ms(),
        };
        self.persist_and_apply(&mut state, Topic::Semester(semester_id), &event)
            .await?;
        state
            .assignment(&week_id, &room_id)
            .cloned()
            .ok_or(EngineError::NotFound(room_id))
    }

    /// Returns whether the room had an assignment to clear.
    pub async fn clear_assignment(
        &self,
        actor: &Actor,
        week_id: Ulid,
        room_id: Ulid,
    ) -> Result<bool, EngineError> {
        actor.require_manage()?;
        let mut state = self.state.write().await;
        let semester_id = state
            .week(&week_id)
            .ok_or(EngineError::NotFound(week_id))?
            .semester_id;
        if state.assignment(&week_id, &room_id).is_none() {
            return Ok(false);
        }
        let event = Event::AssignmentCleared { week_id, room_id };
        self.persist_and_apply(&mut state, Topic::Semester(semester_id), &event)
            .await?;
        Ok(true)
    }

    // ── Exceptions ───────────────────────────────────────────

    /// Mark a day as excused. One record per date; a second call replaces the reason.
    pub async fn upsert_exception(
        &self,
        actor: &Actor,
        semester_id: Ulid,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<CleaningException, EngineError> {
        actor.require_manage()?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LEN) {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let mut state = self.state.write().await;
        let semester = state
            .semester(&semester_id)
            .ok_or(EngineError::NotFound(semester_id))?;
        if date < semester.starts_on || date > semester.ends_on {
            return Err(EngineError::InvalidInput(format!(
                "{date} is outside semester {} ({} to {})",
                semester.name, semester.starts_on, semester.ends_on
            )));
        }
        let id = state
            .exception(semester_id, date)
            .map(|e| e.id)
            .unwrap_or_else(Ulid::new);
        let event = Event::ExceptionUpserted { id, semester_id, date, reason };
        self.persist_and_apply(&mut state, Topic::Semester(semester_id), &event)
            .await?;
        state
            .exception(semester_id, date)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// Returns whether an exception existed on that date.
    pub async fn remove_exception(
        &self,
        actor: &Actor,
        semester_id: Ulid,
        date: NaiveDate,
    ) -> Result<bool, EngineError> {
        actor.require_manage()?;
        let mut state = self.state.write().await;
        if state.exception(semester_id, date).is_none() {
            return Ok(false);
        }
        let event = Event::ExceptionRemoved { semester_id, date };
        self.persist_and_apply(&mut state, Topic::Semester(semester_id), &event)
            .await?;
        Ok(true)
    }
}
