pub mod coordinates;
pub mod position_sample;
pub mod ride;
pub mod fare_rule;
pub mod driver;
