pub mod login_throttle;

pub use login_throttle::{throttle_login, LoginThrottle};
