pub mod data;
pub mod devig;
pub mod ev_analysis;
pub mod ev_calculator;
pub mod interpolator;
pub mod ladder;
pub mod notation;
