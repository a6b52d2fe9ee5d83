use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("message missing required 'job_id' field")]
    MissingJobId,
    #[error("original_message is missing or unparseable")]
    MissingOriginalMessage,
}
