pub mod content_store;
pub mod delivery_ledger;
pub mod dispatcher;
pub mod publish_handler;
pub mod recipient_store;
pub mod scheduled_job;
pub mod slot;
pub mod throttle;

pub use content_store::{ContentStore, ContentfulStore};
pub use delivery_ledger::{DeliveryLedger, PgDeliveryLedger};
pub use dispatcher::{DispatchOutcome, Dispatcher, MessageTemplate, PushGateway};
pub use recipient_store::{PgRecipientStore, RecipientStore};
pub use throttle::DispatchThrottle;
