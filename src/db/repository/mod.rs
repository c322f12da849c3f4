pub mod activity;
pub mod booking;
pub mod calendar_shares;
pub mod user;

pub use activity::ActivityRepository;
pub use booking::BookingRepository;
pub use calendar_shares::CalendarShareRepository;
pub use user::UserRepository;
