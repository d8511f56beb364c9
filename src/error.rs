use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("command has an empty argv")]
    EmptyArgv,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExecError>;
