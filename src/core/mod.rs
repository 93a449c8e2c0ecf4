pub mod binary;
pub mod gap;
pub mod ratio_hash;
pub mod segment;
pub mod text;
