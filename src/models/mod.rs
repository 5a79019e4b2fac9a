pub mod loaders;
pub mod record;

pub use loaders::load_work_items;
pub use record::{ExtraInfo, ItemIndex, Prompt, ScienceRecord, Turn, WorkItem};
