use chrono::{NaiveDateTime, Timelike, Utc};

pub mod chrome;
pub mod publishing;
pub mod resolver;
pub mod saving;
pub mod snapshot;

pub use self::chrome::ChromeLauncher;
pub use self::publishing::PublishingService;
pub use self::resolver::HashResolver;
pub use self::saving::{SaveCoordinator, SaveCoordinatorHandle};
pub use self::snapshot::{BrowserLauncher, BrowserSession, SnapshotOptions, SnapshotService};

// timestamps are kept at second precision, which is what the editor displays
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
