pub mod email;
pub mod id;
pub mod time;

pub use email::{is_valid_email, normalize_email};
pub use id::generate_id;
pub use time::{Clock, ManualClock, SystemClock};
