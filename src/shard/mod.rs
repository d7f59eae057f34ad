pub mod discover;
pub mod table;

pub use discover::discover_shards;
pub use table::{read_input_rows, read_prompt_shard, write_prompt_shard, InputColumns};
