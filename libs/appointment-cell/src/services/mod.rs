pub mod admin;
pub mod booking;
pub mod lifecycle;

pub use admin::AdminService;
pub use booking::BookingService;
pub use lifecycle::LifecycleService;
