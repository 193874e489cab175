pub mod cache_entry;
pub mod outcome;
pub mod phone;

pub use cache_entry::CacheEntry;
pub use outcome::{CaptchaStats, CheckOutcome, CheckReport, REGISTERED_PHRASE};
pub use phone::{normalize, NormalizedPhone};
