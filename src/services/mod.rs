pub mod calendar;
pub mod editor;
pub mod init;
pub mod occurrences;
pub mod resolver;
pub mod schedules;
