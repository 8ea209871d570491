pub mod pipeline;
pub mod run;
pub mod single_flight;
