//! Input bounds enforced by the engine before anything reaches the core.

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_CONTACT_FIELD_LEN: usize = 256;
pub const MAX_SPECIALTY_LEN: usize = 128;
pub const MAX_REASON_LEN: usize = 1024;
pub const MAX_PERSONS: usize = 1_000_000;
pub const MAX_APPOINTMENTS: usize = 10_000_000;
/// Upper bound for "last N audit entries".
pub const MAX_AUDIT_TAIL: usize = 1000;
