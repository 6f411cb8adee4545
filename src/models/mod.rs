pub mod ranking;
pub mod series;
pub mod ticker;
