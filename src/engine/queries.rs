use chrono::{Days, NaiveDate};
use ulid::Ulid;

use crate::access::Actor;
use crate::calendar::{build_weekdays, week_start_of};
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// The tenant's active semester, or a configuration error when none is set.
    pub async fn active_semester(&self) -> Result<Semester, EngineError> {
        let state = self.state.read().await;
        state
            .active_semester()
            .cloned()
            .ok_or(EngineError::NoActiveSemester)
    }

    pub async fn list_semesters(&self) -> Vec<Semester> {
        let state = self.state.read().await;
        state.semesters().into_iter().cloned().collect()
    }

    /// Rooms in rotation order.
    pub async fn list_rooms(&self) -> Vec<Room> {
        let state = self.state.read().await;
        state.rooms_in_order().into_iter().cloned().collect()
    }

    pub async fn list_areas(&self, include_inactive: bool) -> Vec<CleaningArea> {
        let state = self.state.read().await;
        state
            .areas_in_order(include_inactive)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Read-only lookup; never creates a week.
    pub async fn find_week(&self, semester_id: Ulid, date: NaiveDate) -> Option<CleaningWeek> {
        let monday = week_start_of(date)?;
        let state = self.state.read().await;
        state.week_for(semester_id, monday).cloned()
    }

    pub async fn week_assignments(&self, week_id: Ulid) -> Result<Vec<CleaningAssignment>, EngineError> {
        let state = self.state.read().await;
        if state.week(&week_id).is_none() {
            return Err(EngineError::NotFound(week_id));
        }
        Ok(state.assignments_for(&week_id).into_iter().cloned().collect())
    }

    /// Latest (room, area) timestamps, newest first.
    pub async fn assignment_history(&self) -> Vec<HistoryEntry> {
        self.state.read().await.history()
    }

    pub async fn list_exceptions(
        &self,
        semester_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<CleaningException> {
        let state = self.state.read().await;
        state
            .exceptions_between(semester_id, from, to)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Everything a week page renders: the week, its weekdays with exceptions,
    /// and one row per room. Viewing a week is its first access, so the week
    /// is created if missing.
    pub async fn week_view(
        &self,
        actor: &Actor,
        semester_id: Ulid,
        date: NaiveDate,
    ) -> Result<WeekView, EngineError> {
        let week = self.ensure_week(actor, semester_id, date, None).await?;

        let state = self.state.read().await;
        let friday = week
            .week_start
            .checked_add_days(Days::new(4))
            .unwrap_or(NaiveDate::MAX);
        let exceptions: Vec<CleaningException> = state
            .exceptions_between(semester_id, week.week_start, friday)
            .into_iter()
            .cloned()
            .collect();
        let weekdays = build_weekdays(week.week_start, &exceptions);

        let rows = state
            .rooms_in_order()
            .into_iter()
            .map(|room| {
                let assignment = state.assignment(&week.id, &room.id);
                let area = assignment.and_then(|a| state.area(&a.area_id));
                WeekRow {
                    room_id: room.id,
                    room_label: room.label.clone(),
                    room_level: room.level,
                    area_id: assignment.map(|a| a.area_id),
                    area_name: area.map(|a| a.name.clone()),
                    resting: week
                        .rest_level
                        .is_some_and(|level| room.level == i32::from(level)),
                }
            })
            .collect();

        Ok(WeekView { week, weekdays, rows })
    }
}
