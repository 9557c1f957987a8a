pub mod lesson;
pub mod participant;
pub mod recurrence;
pub mod session;
pub mod slot;
