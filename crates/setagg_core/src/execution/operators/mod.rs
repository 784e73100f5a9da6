pub mod hash_aggregate;
