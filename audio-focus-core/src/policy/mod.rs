pub mod focus_table;
pub mod table_config;
