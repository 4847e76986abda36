pub mod achievements;
pub mod common;
pub mod config;
pub mod profile;
pub mod redeem;
pub mod stats;
pub mod track;
