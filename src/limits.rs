pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 256;

pub const MAX_ROOMS_PER_TENANT: usize = 2_000;
pub const MAX_AREAS_PER_TENANT: usize = 500;
pub const MAX_SEMESTERS_PER_TENANT: usize = 200;
/// Longest semester, in days from first to last day.
pub const MAX_SEMESTER_DAYS: i64 = 366;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_REASON_LEN: usize = 512;

/// Rest levels cycle through 1..=MAX_REST_LEVEL.
pub const MAX_REST_LEVEL: u8 = 3;
