pub mod assignment;
pub mod bid;
pub mod driver;
pub mod event;
pub mod job;
