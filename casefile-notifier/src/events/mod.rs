pub mod entry_fields;
pub mod publish_event;
