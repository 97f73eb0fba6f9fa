pub mod command;
pub mod shell;
pub mod template;
