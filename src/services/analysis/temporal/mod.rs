pub mod aggregation;
pub mod breakpoints;
pub mod comparison;
pub mod event_window;
pub mod features;
pub mod gaps;
pub mod impact_timing;
pub mod periodicity;
pub mod rolling_correlation;
pub mod seasonal;
pub mod significance;
pub mod types;
pub mod window_size;
pub mod windows;
