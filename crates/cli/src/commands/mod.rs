pub mod compile;
pub mod config_cmd;
pub mod run;
