use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. Calendar days use `NaiveDate` (UTC).
pub type Ms = i64;

/// Room level exempt from cleaning for a week, in `1..=3`.
pub type RestLevel = u8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub id: Ulid,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub label: String,
    pub capacity: u32,
    /// Floor or tier; compared against a week's rest level.
    pub level: i32,
    pub position: i32,
}

impl Room {
    /// Rotation order: level, then position, then label for stability.
    pub fn order_key(&self) -> (i32, i32, &str) {
        (self.level, self.position, self.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningArea {
    pub id: Ulid,
    pub name: String,
    pub active: bool,
    pub position: i32,
}

impl CleaningArea {
    /// The garden is always routed to the room that held it longest ago.
    pub fn is_garden(&self) -> bool {
        self.name.to_lowercase().contains("garden")
    }

    pub fn order_key(&self) -> (i32, &str) {
        (self.position, self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningWeek {
    pub id: Ulid,
    pub semester_id: Ulid,
    /// Monday of the Mon–Fri work week.
    pub week_start: NaiveDate,
    /// `None` only for weeks recorded without a level; such weeks exclude nobody.
    pub rest_level: Option<RestLevel>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningAssignment {
    pub id: Ulid,
    pub week_id: Ulid,
    pub room_id: Ulid,
    pub area_id: Ulid,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningException {
    pub id: Ulid,
    pub semester_id: Ulid,
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// One generated row inside an `AssignmentsReplaced` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub id: Ulid,
    pub room_id: Ulid,
    pub area_id: Ulid,
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SemesterCreated {
        id: Ulid,
        name: String,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    },
    SemesterActivated {
        id: Ulid,
    },
    RoomCreated {
        id: Ulid,
        label: String,
        capacity: u32,
        level: i32,
        position: i32,
    },
    RoomUpdated {
        id: Ulid,
        label: String,
        capacity: u32,
        level: i32,
        position: i32,
    },
    AreaCreated {
        id: Ulid,
        name: String,
        position: i32,
        active: bool,
    },
    AreaUpdated {
        id: Ulid,
        name: String,
        position: i32,
        active: bool,
    },
    AreaDeleted {
        id: Ulid,
    },
    WeekCreated {
        id: Ulid,
        semester_id: Ulid,
        week_start: NaiveDate,
        rest_level: Option<RestLevel>,
        at: Ms,
    },
    WeekRestLevelSet {
        id: Ulid,
        rest_level: RestLevel,
        at: Ms,
    },
    /// Whole-week replacement: old rows removed and new rows inserted in one record.
    AssignmentsReplaced {
        week_id: Ulid,
        rows: Vec<AssignmentRow>,
        at: Ms,
    },
    AssignmentSet {
        id: Ulid,
        week_id: Ulid,
        room_id: Ulid,
        area_id: Ulid,
        at: Ms,
    },
    AssignmentCleared {
        week_id: Ulid,
        room_id: Ulid,
    },
    ExceptionUpserted {
        id: Ulid,
        semester_id: Ulid,
        date: NaiveDate,
        reason: Option<String>,
    },
    ExceptionRemoved {
        semester_id: Ulid,
        date: NaiveDate,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Most recent time a room held an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub room_id: Ulid,
    pub area_id: Ulid,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayEntry {
    pub date: NaiveDate,
    pub label: &'static str,
    pub excused: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekRow {
    pub room_id: Ulid,
    pub room_label: String,
    pub room_level: i32,
    pub area_id: Option<Ulid>,
    pub area_name: Option<String>,
    pub resting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekView {
    pub week: CleaningWeek,
    pub weekdays: Vec<WeekdayEntry>,
    pub rows: Vec<WeekRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generation {
    pub week: CleaningWeek,
    pub created: Vec<CleaningAssignment>,
}
