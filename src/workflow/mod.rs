pub mod record_flow;

pub use record_flow::{response_field, RecordFlow, SCIENCE_DEFAULTS};
