pub mod chart;
pub mod pdf;
