use std::sync::Arc;
use tracing::debug;

use crate::client::{Client, LocalhostClient};
use crate::error::Error;
use crate::flock::Flock;
use crate::shell;
use crate::supfile::CommandSpec;
use crate::tasks::{CommandTask, Partition, Task, TaskInput, TaskKind, TemplateTask};
use crate::template::{self, Template, Vars};
use crate::upload;

const TRACE: &str = "set -x;";


/// Build the ordered tasks for one command: uploads, then the template,
/// script, local and run steps. Nothing is returned if any step fails to
/// build.
pub async fn create_tasks(
    flock: &Flock,
    cmd: &CommandSpec,
    clients: &[Arc<dyn Client>],
    env: &str,
) -> Result<Vec<Task>, Error> {
    let mut tasks = vec![];
    let partition = Partition::new(cmd.once, cmd.serial);

    let cwd = std::env::current_dir().map_err(Error::Cwd)?;

    for up in &cmd.upload {
        require_clients(clients, "upload")?;
        let upload_err = |reason| Error::Upload {
            src: up.src.clone(),
            reason,
        };
        let src = upload::resolve_local_path(&cwd, &up.src, env)
            .await
            .map_err(upload_err)?;
        let archive = upload::tar_stream(&cwd, &src, &up.exclude)
            .await
            .map_err(upload_err)?;
        debug!(src = %src, dst = %up.dst, bytes = archive.len(), "packed upload");

        let kind = TaskKind::Command(CommandTask::new(
            upload::remote_tar_command(&up.dst),
            TaskInput::Bytes(archive),
            false,
        ));
        tasks.extend(partition.tasks(kind, clients));
    }

    if let Some(spec) = &cmd.template {
        require_clients(clients, "template")?;
        if spec.dst.is_empty() {
            return Err(Error::Config(format!(
                "template {}: empty destination",
                spec.src.display()
            )));
        }
        let template = Template::load(&spec.src)?;
        let vars = match &spec.vars {
            Some(path) => template::load_vars(path)?,
            None => Vars::new(),
        };

        let kind = TaskKind::Template(TemplateTask::new(template, spec.dst.clone(), vars));
        // Every client renders its own copy, so `once` has no say here.
        let partition = Partition::new(false, cmd.serial);
        tasks.extend(partition.tasks(kind, clients));
    }

    if let Some(path) = &cmd.script {
        require_clients(clients, "script")?;
        let body = std::fs::read_to_string(path)
            .map_err(|err| Error::io("can't read script", path, err))?;
        tasks.extend(partition.tasks(flock.remote_kind(body, cmd.stdin), clients));
    }

    if let Some(local) = &cmd.local {
        let mut client = LocalhostClient::new(format!(
            "{}{}",
            env,
            shell::export("SUP_HOST", "localhost")
        ));
        client.connect().await?;
        let client: Arc<dyn Client> = Arc::new(client);
        let kind = flock.remote_kind(local.clone(), cmd.stdin);
        tasks.push(Task::new(Arc::new(kind), vec![client]));
    }

    if let Some(run) = &cmd.run {
        require_clients(clients, "run")?;
        tasks.extend(partition.tasks(flock.remote_kind(run.clone(), cmd.stdin), clients));
    }

    debug!(tasks = tasks.len(), ?partition, "created tasks");
    Ok(tasks)
}


impl Flock {
    fn remote_kind(&self, body: String, stdin: bool) -> TaskKind {
        let run = if self.debug {
            format!("{}{}", TRACE, body)
        } else {
            body
        };
        let input = if stdin { TaskInput::Stdin } else { TaskInput::None };
        TaskKind::Command(CommandTask::new(run, input, true))
    }
}


fn require_clients(clients: &[Arc<dyn Client>], what: &'static str) -> Result<(), Error> {
    if clients.is_empty() {
        return Err(Error::NoClients(what));
    }
    Ok(())
}
