pub mod jsonl_loader;

pub use jsonl_loader::load_work_items;
