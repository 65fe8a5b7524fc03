use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

/// All rota data for one tenant. Rebuilt from the WAL on startup; every
/// change goes through `apply` so replay and live writes share one path.
#[derive(Debug, Default)]
pub struct RotaState {
    semesters: HashMap<Ulid, Semester>,
    rooms: HashMap<Ulid, Room>,
    areas: HashMap<Ulid, CleaningArea>,
    weeks: HashMap<Ulid, CleaningWeek>,
    /// (semester, monday) → week id. One week per key.
    week_index: HashMap<(Ulid, NaiveDate), Ulid>,
    /// week → room → assignment. The inner key enforces one row per (week, room).
    assignments: HashMap<Ulid, HashMap<Ulid, CleaningAssignment>>,
    exceptions: BTreeMap<(Ulid, NaiveDate), CleaningException>,
}

impl RotaState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Semesters ────────────────────────────────────────────

    pub fn semester(&self, id: &Ulid) -> Option<&Semester> {
        self.semesters.get(id)
    }

    pub fn semester_count(&self) -> usize {
        self.semesters.len()
    }

    pub fn active_semester(&self) -> Option<&Semester> {
        self.semesters.values().find(|s| s.active)
    }

    pub fn semesters(&self) -> Vec<&Semester> {
        let mut all: Vec<&Semester> = self.semesters.values().collect();
        all.sort_by_key(|s| (s.starts_on, s.id));
        all
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room(&self, id: &Ulid) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Rooms in rotation order (level, position).
    pub fn rooms_in_order(&self) -> Vec<&Room> {
        let mut all: Vec<&Room> = self.rooms.values().collect();
        all.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        all
    }

    // ── Areas ────────────────────────────────────────────────

    pub fn area(&self, id: &Ulid) -> Option<&CleaningArea> {
        self.areas.get(id)
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Areas ordered by (position, name).
    pub fn areas_in_order(&self, include_inactive: bool) -> Vec<&CleaningArea> {
        let mut all: Vec<&CleaningArea> = self
            .areas
            .values()
            .filter(|a| include_inactive || a.active)
            .collect();
        all.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        all
    }

    // ── Weeks ────────────────────────────────────────────────

    pub fn week(&self, id: &Ulid) -> Option<&CleaningWeek> {
        self.weeks.get(id)
    }

    pub fn week_for(&self, semester_id: Ulid, monday: NaiveDate) -> Option<&CleaningWeek> {
        self.week_index
            .get(&(semester_id, monday))
            .and_then(|id| self.weeks.get(id))
    }

    /// Latest week of the semester starting strictly before `monday`.
    pub fn previous_week(&self, semester_id: Ulid, monday: NaiveDate) -> Option<&CleaningWeek> {
        self.weeks
            .values()
            .filter(|w| w.semester_id == semester_id && w.week_start < monday)
            .max_by_key(|w| w.week_start)
    }

    pub fn week_count(&self, semester_id: Ulid) -> usize {
        self.weeks
            .values()
            .filter(|w| w.semester_id == semester_id)
            .count()
    }

    // ── Assignments ──────────────────────────────────────────

    pub fn assignment(&self, week_id: &Ulid, room_id: &Ulid) -> Option<&CleaningAssignment> {
        self.assignments.get(week_id).and_then(|rows| rows.get(room_id))
    }

    /// A week's assignments in room rotation order.
    pub fn assignments_for(&self, week_id: &Ulid) -> Vec<&CleaningAssignment> {
        let Some(rows) = self.assignments.get(week_id) else {
            return Vec::new();
        };
        let mut out: Vec<&CleaningAssignment> = rows.values().collect();
        out.sort_by(|a, b| {
            let ka = self.rooms.get(&a.room_id).map(|r| r.order_key());
            let kb = self.rooms.get(&b.room_id).map(|r| r.order_key());
            ka.cmp(&kb).then(a.room_id.cmp(&b.room_id))
        });
        out
    }

    /// Every assignment row the tenant holds, across all weeks.
    pub fn all_assignments(&self) -> impl Iterator<Item = &CleaningAssignment> {
        self.assignments.values().flat_map(|rows| rows.values())
    }

    /// Most recent time each room held each area: a max-per-(room, area) reduction.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut latest: HashMap<(Ulid, Ulid), Ms> = HashMap::new();
        for a in self.all_assignments() {
            latest
                .entry((a.room_id, a.area_id))
                .and_modify(|t| *t = (*t).max(a.created_at))
                .or_insert(a.created_at);
        }
        let mut out: Vec<HistoryEntry> = latest
            .into_iter()
            .map(|((room_id, area_id), created_at)| HistoryEntry {
                room_id,
                area_id,
                created_at,
            })
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.room_id.cmp(&b.room_id))
                .then(a.area_id.cmp(&b.area_id))
        });
        out
    }

    // ── Exceptions ───────────────────────────────────────────

    pub fn exception(&self, semester_id: Ulid, date: NaiveDate) -> Option<&CleaningException> {
        self.exceptions.get(&(semester_id, date))
    }

    /// Exceptions with `from <= date <= to`, in date order.
    pub fn exceptions_between(
        &self,
        semester_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<&CleaningException> {
        if from > to {
            return Vec::new();
        }
        self.exceptions
            .range((semester_id, from)..=(semester_id, to))
            .map(|(_, e)| e)
            .collect()
    }

    // ── Event application ────────────────────────────────────

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::SemesterCreated {
                id,
                name,
                starts_on,
                ends_on,
            } => {
                self.semesters.insert(
                    *id,
                    Semester {
                        id: *id,
                        name: name.clone(),
                        starts_on: *starts_on,
                        ends_on: *ends_on,
                        active: false,
                    },
                );
            }
            Event::SemesterActivated { id } => {
                if self.semesters.contains_key(id) {
                    for s in self.semesters.values_mut() {
                        s.active = s.id == *id;
                    }
                }
            }
            Event::RoomCreated {
                id,
                label,
                capacity,
                level,
                position,
            }
            | Event::RoomUpdated {
                id,
                label,
                capacity,
                level,
                position,
            } => {
                self.rooms.insert(
                    *id,
                    Room {
                        id: *id,
                        label: label.clone(),
                        capacity: *capacity,
                        level: *level,
                        position: *position,
                    },
                );
            }
            Event::AreaCreated {
                id,
                name,
                position,
                active,
            }
            | Event::AreaUpdated {
                id,
                name,
                position,
                active,
            } => {
                self.areas.insert(
                    *id,
                    CleaningArea {
                        id: *id,
                        name: name.clone(),
                        active: *active,
                        position: *position,
                    },
                );
            }
            Event::AreaDeleted { id } => {
                self.areas.remove(id);
                for rows in self.assignments.values_mut() {
                    rows.retain(|_, a| a.area_id != *id);
                }
            }
            Event::WeekCreated {
                id,
                semester_id,
                week_start,
                rest_level,
                at,
            } => {
                self.weeks.insert(
                    *id,
                    CleaningWeek {
                        id: *id,
                        semester_id: *semester_id,
                        week_start: *week_start,
                        rest_level: *rest_level,
                        created_at: *at,
                        updated_at: *at,
                    },
                );
                self.week_index.insert((*semester_id, *week_start), *id);
            }
            Event::WeekRestLevelSet { id, rest_level, at } => {
                if let Some(week) = self.weeks.get_mut(id) {
                    week.rest_level = Some(*rest_level);
                    week.updated_at = *at;
                }
            }
            Event::AssignmentsReplaced { week_id, rows, at } => {
                let replaced: HashMap<Ulid, CleaningAssignment> = rows
                    .iter()
                    .map(|row| {
                        (
                            row.room_id,
                            CleaningAssignment {
                                id: row.id,
                                week_id: *week_id,
                                room_id: row.room_id,
                                area_id: row.area_id,
                                created_at: *at,
                            },
                        )
                    })
                    .collect();
                self.assignments.insert(*week_id, replaced);
            }
            Event::AssignmentSet {
                id,
                week_id,
                room_id,
                area_id,
                at,
            } => {
                self.assignments.entry(*week_id).or_default().insert(
                    *room_id,
                    CleaningAssignment {
                        id: *id,
                        week_id: *week_id,
                        room_id: *room_id,
                        area_id: *area_id,
                        created_at: *at,
                    },
                );
            }
            Event::AssignmentCleared { week_id, room_id } => {
                if let Some(rows) = self.assignments.get_mut(week_id) {
                    rows.remove(room_id);
                }
            }
            Event::ExceptionUpserted {
                id,
                semester_id,
                date,
                reason,
            } => {
                self.exceptions.insert(
                    (*semester_id, *date),
                    CleaningException {
                        id: *id,
                        semester_id: *semester_id,
                        date: *date,
                        reason: reason.clone(),
                    },
                );
            }
            Event::ExceptionRemoved { semester_id, date } => {
                self.exceptions.remove(&(*semester_id, *date));
            }
        }
    }

    /// Minimal event list that recreates the current state. Used for WAL compaction.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();

        for s in self.semesters() {
            events.push(Event::SemesterCreated {
                id: s.id,
                name: s.name.clone(),
                starts_on: s.starts_on,
                ends_on: s.ends_on,
            });
        }
        if let Some(active) = self.active_semester() {
            events.push(Event::SemesterActivated { id: active.id });
        }

        for r in self.rooms_in_order() {
            events.push(Event::RoomCreated {
                id: r.id,
                label: r.label.clone(),
                capacity: r.capacity,
                level: r.level,
                position: r.position,
            });
        }

        for a in self.areas_in_order(true) {
            events.push(Event::AreaCreated {
                id: a.id,
                name: a.name.clone(),
                position: a.position,
                active: a.active,
            });
        }

        let mut weeks: Vec<&CleaningWeek> = self.weeks.values().collect();
        weeks.sort_by_key(|w| (w.semester_id, w.week_start));
        for w in weeks {
            events.push(Event::WeekCreated {
                id: w.id,
                semester_id: w.semester_id,
                week_start: w.week_start,
                rest_level: w.rest_level,
                at: w.created_at,
            });
            if w.updated_at != w.created_at
                && let Some(level) = w.rest_level
            {
                events.push(Event::WeekRestLevelSet {
                    id: w.id,
                    rest_level: level,
                    at: w.updated_at,
                });
            }
            // Per-row records keep each row's own timestamp.
            for a in self.assignments_for(&w.id) {
                events.push(Event::AssignmentSet {
                    id: a.id,
                    week_id: a.week_id,
                    room_id: a.room_id,
                    area_id: a.area_id,
                    at: a.created_at,
                });
            }
        }

        for e in self.exceptions.values() {
            events.push(Event::ExceptionUpserted {
                id: e.id,
                semester_id: e.semester_id,
                date: e.date,
                reason: e.reason.clone(),
            });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded() -> (RotaState, Ulid, Ulid, Ulid, Ulid) {
        let mut st = RotaState::new();
        let sem = Ulid::new();
        let room = Ulid::new();
        let area = Ulid::new();
        let week = Ulid::new();
        st.apply(&Event::SemesterCreated {
            id: sem,
            name: "Fall".into(),
            starts_on: d(2024, 8, 1),
            ends_on: d(2024, 12, 20),
        });
        st.apply(&Event::RoomCreated {
            id: room,
            label: "101".into(),
            capacity: 4,
            level: 1,
            position: 0,
        });
        st.apply(&Event::AreaCreated {
            id: area,
            name: "Kitchen".into(),
            position: 0,
            active: true,
        });
        st.apply(&Event::WeekCreated {
            id: week,
            semester_id: sem,
            week_start: d(2024, 9, 2),
            rest_level: Some(2),
            at: 10,
        });
        (st, sem, room, area, week)
    }

    #[test]
    fn assignment_set_replaces_per_room() {
        let (mut st, _, room, area, week) = seeded();
        let other_area = Ulid::new();
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: week,
            room_id: room,
            area_id: area,
            at: 100,
        });
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: week,
            room_id: room,
            area_id: other_area,
            at: 200,
        });
        let rows = st.assignments_for(&week);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].area_id, other_area);
    }

    #[test]
    fn replaced_drops_previous_rows() {
        let (mut st, _, room, area, week) = seeded();
        let stale_room = Ulid::new();
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: week,
            room_id: stale_room,
            area_id: area,
            at: 100,
        });
        st.apply(&Event::AssignmentsReplaced {
            week_id: week,
            rows: vec![AssignmentRow {
                id: Ulid::new(),
                room_id: room,
                area_id: area,
            }],
            at: 300,
        });
        let rows = st.assignments_for(&week);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].room_id, room);
        assert_eq!(rows[0].created_at, 300);
    }

    #[test]
    fn history_keeps_latest_per_pair_regardless_of_order() {
        let (mut st, sem, room, area, week) = seeded();
        let later_week = Ulid::new();
        st.apply(&Event::WeekCreated {
            id: later_week,
            semester_id: sem,
            week_start: d(2024, 9, 9),
            rest_level: Some(3),
            at: 20,
        });
        // Newer row applied first, older second.
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: later_week,
            room_id: room,
            area_id: area,
            at: 900,
        });
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: week,
            room_id: room,
            area_id: area,
            at: 400,
        });
        let history = st.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].created_at, 900);
    }

    #[test]
    fn area_delete_clears_assignments() {
        let (mut st, _, room, area, week) = seeded();
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: week,
            room_id: room,
            area_id: area,
            at: 100,
        });
        st.apply(&Event::AreaDeleted { id: area });
        assert!(st.area(&area).is_none());
        assert!(st.assignments_for(&week).is_empty());
        assert!(st.history().is_empty());
    }

    #[test]
    fn activation_is_exclusive() {
        let (mut st, sem, ..) = seeded();
        let spring = Ulid::new();
        st.apply(&Event::SemesterCreated {
            id: spring,
            name: "Spring".into(),
            starts_on: d(2025, 1, 10),
            ends_on: d(2025, 5, 30),
        });
        st.apply(&Event::SemesterActivated { id: sem });
        assert_eq!(st.active_semester().map(|s| s.id), Some(sem));
        st.apply(&Event::SemesterActivated { id: spring });
        assert_eq!(st.active_semester().map(|s| s.id), Some(spring));
        assert!(!st.semester(&sem).unwrap().active);
    }

    #[test]
    fn previous_week_is_latest_earlier_in_semester() {
        let (mut st, sem, ..) = seeded();
        let other_sem = Ulid::new();
        st.apply(&Event::WeekCreated {
            id: Ulid::new(),
            semester_id: other_sem,
            week_start: d(2024, 9, 9),
            rest_level: Some(1),
            at: 30,
        });
        st.apply(&Event::WeekCreated {
            id: Ulid::new(),
            semester_id: sem,
            week_start: d(2024, 9, 23),
            rest_level: Some(1),
            at: 40,
        });
        let prev = st.previous_week(sem, d(2024, 9, 16)).unwrap();
        assert_eq!(prev.week_start, d(2024, 9, 2));
        assert!(st.previous_week(sem, d(2024, 9, 2)).is_none());
    }

    #[test]
    fn exceptions_range_and_upsert() {
        let (mut st, sem, ..) = seeded();
        for (day, reason) in [(3, "a"), (5, "b"), (12, "c")] {
            st.apply(&Event::ExceptionUpserted {
                id: Ulid::new(),
                semester_id: sem,
                date: d(2024, 9, day),
                reason: Some(reason.into()),
            });
        }
        st.apply(&Event::ExceptionUpserted {
            id: Ulid::new(),
            semester_id: sem,
            date: d(2024, 9, 5),
            reason: Some("b2".into()),
        });
        let hits = st.exceptions_between(sem, d(2024, 9, 2), d(2024, 9, 6));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].reason.as_deref(), Some("b2"));
        assert!(st.exceptions_between(sem, d(2024, 9, 6), d(2024, 9, 2)).is_empty());
    }

    #[test]
    fn snapshot_replays_to_same_state() {
        let (mut st, sem, room, area, week) = seeded();
        st.apply(&Event::SemesterActivated { id: sem });
        st.apply(&Event::WeekRestLevelSet { id: week, rest_level: 3, at: 50 });
        st.apply(&Event::AssignmentSet {
            id: Ulid::new(),
            week_id: week,
            room_id: room,
            area_id: area,
            at: 100,
        });
        st.apply(&Event::ExceptionUpserted {
            id: Ulid::new(),
            semester_id: sem,
            date: d(2024, 9, 4),
            reason: None,
        });

        let mut rebuilt = RotaState::new();
        for e in st.snapshot_events() {
            rebuilt.apply(&e);
        }
        assert_eq!(rebuilt.active_semester(), st.active_semester());
        assert_eq!(rebuilt.room(&room), st.room(&room));
        assert_eq!(rebuilt.area(&area), st.area(&area));
        assert_eq!(rebuilt.week(&week), st.week(&week));
        assert_eq!(rebuilt.assignments_for(&week), st.assignments_for(&week));
        assert_eq!(rebuilt.exception(sem, d(2024, 9, 4)), st.exception(sem, d(2024, 9, 4)));
    }
}
