pub mod feed;
pub mod gate;
pub mod notifications;
pub mod reservation;
pub mod rules;
pub mod service;

pub use crate::feed::{FeedError, FeedMessage, InMemoryFeed, ReservationFeed};
pub use crate::gate::{SuppressionPolicy, DEFAULT_SUPPRESSION_WINDOW};
pub use crate::notifications::{Notification, NotificationKind, NotificationSink};
pub use crate::reservation::{ChangeEvent, ChangeKind, Reservation, ReservationStatus, Viewer};
pub use crate::service::{
    ListenerHandle, ListenerStats, ReservationNotifier, ReservationNotifierBuilder,
};
