pub mod data;
pub mod focus;
pub mod pin;
pub mod rules;
pub mod status;
pub mod usage;
