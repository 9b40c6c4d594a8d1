pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{hash_pair, seeded_bytes, write_tree};
