pub mod facade;
pub mod in_process;
