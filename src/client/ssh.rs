use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::client::{Address, Client, ClientError, ClientIdentity, Payload};
use crate::process::Process;

const CONNECT_TIMEOUT_SECS: u32 = 10;


/// Runs commands on a remote host through the system `ssh` binary.
/// Authentication is whatever `ssh` and its config provide.
#[derive(Debug)]
pub struct SshClient {
    address: Address,
    env: String,
    connected: bool,
    echo: bool,
}

impl SshClient {
    pub fn new(address: Address, env: String) -> Self {
        Self {
            address,
            env,
            connected: false,
            echo: true,
        }
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn destination(&self) -> String {
        match &self.address.user {
            Some(user) => format!("{}@{}", user, self.address.host),
            None => self.address.host.clone(),
        }
    }

    fn args(&self, tty: bool) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", CONNECT_TIMEOUT_SECS),
            (if tty { "-tt" } else { "-T" }).to_string(),
        ];

        if let Some(port) = self.address.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        args.push(self.destination());
        args
    }

    fn command(&self, remote: &str, tty: bool) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.args(tty)).arg(remote);
        cmd
    }
}

#[async_trait]
impl Client for SshClient {
    fn host(&self) -> &str {
        &self.address.host
    }

    fn identity(&self) -> ClientIdentity {
        ClientIdentity {
            host: self.address.host.clone(),
            user: self.address.user.clone(),
            port: self.address.port,
        }
    }

    async fn connect(&mut self) -> Result<(), ClientError> {
        if self.connected {
            return Ok(());
        }

        debug!(host = %self.address.host, "checking ssh connection");
        Process::new(self.host(), false)
            .run("ssh", self.command("exit 0", false), Payload::Empty)
            .await
            .map_err(|err| ClientError::Connect {
                host: self.address.host.clone(),
                reason: err.to_string(),
            })?;

        self.connected = true;
        Ok(())
    }

    async fn run(
        &self,
        command: &str,
        payload: Payload,
        tty: bool,
    ) -> Result<(), ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected {
                host: self.address.host.clone(),
            });
        }

        let remote = format!("{}{}", self.env, command);
        Process::new(self.host(), self.echo)
            .run("ssh", self.command(&remote, tty), payload)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_port_user_and_tty() {
        let address = Address::parse("deploy@web1:2222").unwrap();
        let client = SshClient::new(address, String::new());

        let args = client.args(true);
        assert!(args.contains(&"-tt".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert_eq!(args.last().unwrap(), "deploy@web1");

        let args = client.args(false);
        assert!(args.contains(&"-T".to_string()));
    }

    #[test]
    fn default_port_is_left_to_ssh() {
        let client = SshClient::new(Address::parse("web1").unwrap(), String::new());
        assert!(!client.args(false).contains(&"-p".to_string()));
        assert_eq!(client.identity().host, "web1");
        assert_eq!(client.identity().port, None);
    }

    #[tokio::test]
    async fn refuses_to_run_before_connect() {
        let client = SshClient::new(Address::parse("web1").unwrap(), String::new());
        let err = client.run("uptime", Payload::Empty, true).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected { ref host } if host == "web1"));
    }
}
