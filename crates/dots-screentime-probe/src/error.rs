use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run {command}: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    CommandFailed { command: &'static str, status: std::process::ExitStatus },

    #[error("{command} returned malformed JSON: {source}")]
    Json {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("X11 error: {0}")]
    X11(String),

    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    #[error("Refusing to signal protected process {0}")]
    Protected(u32),

    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("Process {0} is still running after SIGKILL")]
    StillRunning(u32),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
