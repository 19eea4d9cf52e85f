use std::path::PathBuf;
use thiserror::Error;

use crate::client::ClientError;
use crate::tasks::Task;


#[derive(Debug, Error)]
pub enum Error {
    #[error("resolving CWD failed: {0}")]
    Cwd(#[source] std::io::Error),

    #[error("upload: {src}: {reason}")]
    Upload { src: String, reason: String },

    #[error("{context}: {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse template {path}: {source}")]
    TemplateParse {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("can't render template: {source}")]
    TemplateRender {
        host: String,
        #[source]
        source: tera::Error,
    },

    #[error("can't parse variables {path}: {source}")]
    Vars {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no clients to run {0} against")]
    NoClients(&'static str),

    #[error("task input: {0}")]
    InputForm(&'static str),

    #[error("config: {0}")]
    Config(String),

    #[error("{}", with_host(.0))]
    Client(#[from] ClientError),

    #[error("{}", summarize(.0))]
    Failed(Vec<TaskError>),
}

impl Error {
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Io { context, path: path.into(), source }
    }
}


/// A single client's failure while running a task.
#[derive(Clone, Debug, Error)]
#[error("Run({:?}) on {host}: {reason}", .task.run())]
pub struct TaskError {
    pub task: Task,
    pub host: String,
    pub reason: String,
}


fn with_host(err: &ClientError) -> String {
    match err.host() {
        Some(host) => format!("{}: {}", host, err),
        None => err.to_string(),
    }
}


fn summarize(errors: &[TaskError]) -> String {
    let mut out = format!("{} task dispatch(es) failed", errors.len());
    for err in errors {
        out.push_str("\n  ");
        out.push_str(&err.to_string());
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{CommandTask, TaskInput, TaskKind};
    use crate::client::LocalhostClient;
    use std::sync::Arc;

    #[test]
    fn task_error_names_command_and_host() {
        let kind = Arc::new(TaskKind::Command(CommandTask::new(
            "uptime".to_string(),
            TaskInput::None,
            true,
        )));
        let client: Arc<dyn crate::client::Client> =
            Arc::new(LocalhostClient::new(String::new()));
        let err = TaskError {
            task: Task::new(kind, vec![client]),
            host: "web1".to_string(),
            reason: "exit status: 1".to_string(),
        };
        assert_eq!(err.to_string(), r#"Run("uptime") on web1: exit status: 1"#);

        let failed = Error::Failed(vec![err]);
        let message = failed.to_string();
        assert!(message.starts_with("1 task dispatch(es) failed"));
        assert!(message.contains("on web1"));
    }

    #[test]
    fn client_errors_name_the_host_once() {
        let err = Error::from(ClientError::Connect {
            host: "web1".to_string(),
            reason: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "web1: connect failed: boom");

        let err = Error::from(ClientError::Address("two words".to_string()));
        assert_eq!(err.to_string(), r#"invalid host address "two words""#);
    }
}
