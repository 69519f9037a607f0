pub mod interrupt_arbiter;
pub mod zone;
