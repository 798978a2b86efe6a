pub mod dates;
pub mod filter;
