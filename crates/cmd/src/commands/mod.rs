pub mod cat;
pub mod run;

pub use cat::cat_command;
pub use run::run_command;
