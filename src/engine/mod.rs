pub mod allocation;
pub mod fairness;
pub mod intake;
pub mod locks;
pub mod scheduler;
pub mod scoring;
pub mod state_machine;
