pub mod booking;
pub mod conversation;
pub mod message;
pub mod resource;
pub mod service_kind;
pub mod slot_catalog;

pub use booking::{Booking, BookingStatus, DisplayStatus, NewBooking};
pub use conversation::{Session, Stage};
pub use message::{InboundMessage, ListMenu, ListRow, OutboundMessage};
pub use resource::Resource;
pub use service_kind::ServiceKind;
pub use slot_catalog::SlotCatalog;
