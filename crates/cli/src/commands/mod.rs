pub mod config;
pub mod doctor;
pub mod parse;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}
