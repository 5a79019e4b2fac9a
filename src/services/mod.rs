pub mod checkpoint;
pub mod label_extractor;
pub mod record_writer;

pub use checkpoint::{CheckpointSet, CheckpointStore};
pub use label_extractor::{compute_reward, LabelExtractor, LabelRule};
pub use record_writer::RecordWriter;
