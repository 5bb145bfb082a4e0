pub mod agent;
pub mod chapter;
pub mod outline;
pub mod request;
pub mod result;
pub mod task;
