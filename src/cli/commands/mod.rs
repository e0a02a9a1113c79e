pub mod deploy;
pub mod providers;
