use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{self, Client};
use crate::error::Error;
use crate::supfile::{CommandSpec, EnvList, Supfile};
use crate::tasks::Task;

mod plan;
mod run;


/// Turns commands into tasks and runs them against a network.
#[derive(Clone, Debug)]
pub struct Flock {
    debug: bool,
    fail_fast: bool,
}

impl Default for Flock {
    fn default() -> Self {
        Self::new()
    }
}

impl Flock {
    pub fn new() -> Self {
        Self {
            debug: false,
            fail_fast: true,
        }
    }

    /// Trace every remote command body with `set -x`.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Stop at the first task with a failed client.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub async fn create_tasks(
        &self,
        cmd: &CommandSpec,
        clients: &[Arc<dyn Client>],
        env: &str,
    ) -> Result<Vec<Task>, Error> {
        plan::create_tasks(self, cmd, clients, env).await
    }

    pub async fn run_tasks(&self, tasks: &[Task]) -> Result<(), Error> {
        run::run_tasks(self, tasks).await
    }

    /// Run `names` (commands or targets) from `supfile` on `network`.
    pub async fn run(
        &self,
        supfile: &Supfile,
        network: &str,
        names: &[String],
        overrides: &EnvList,
    ) -> Result<(), Error> {
        let net = supfile.network(network)?;
        let commands = supfile.resolve(names)?;

        let mut env = supfile.env.clone();
        env.merge(&net.env);
        env.merge(overrides);
        env.set("SUP_NETWORK", network);
        env.set("SUP_USER", std::env::var("USER").unwrap_or_default());
        let env = env.exports();

        let clients = connect(&net.hosts, &env).await?;
        info!(network, hosts = clients.len(), "connected");

        let mut failures = vec![];
        for (name, cmd) in commands {
            info!(command = name, desc = cmd.desc.as_deref().unwrap_or(""), "running command");
            let tasks = self.create_tasks(cmd, &clients, &env).await?;
            match self.run_tasks(&tasks).await {
                Ok(()) => {}
                Err(Error::Failed(errors)) if !self.fail_fast => {
                    warn!(command = name, failed = errors.len(), "command failed, continuing");
                    failures.extend(errors);
                }
                Err(err) => return Err(err),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Failed(failures))
        }
    }
}


async fn connect(hosts: &[String], env: &str) -> Result<Vec<Arc<dyn Client>>, Error> {
    let mut clients = hosts
        .iter()
        .map(|host| client::for_address(host, env))
        .collect::<Result<Vec<_>, _>>()?;

    let results = join_all(clients.iter_mut().map(|client| client.connect())).await;
    for result in results {
        result?;
    }

    Ok(clients.into_iter().map(Arc::from).collect())
}
