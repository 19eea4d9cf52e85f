use async_trait::async_trait;
use tokio::process::Command;

use crate::client::{Client, ClientError, ClientIdentity, Payload};
use crate::process::Process;


/// Runs commands on this machine through `bash -c`.
#[derive(Debug)]
pub struct LocalhostClient {
    env: String,
    user: Option<String>,
    connected: bool,
    echo: bool,
}

impl LocalhostClient {
    pub fn new(env: String) -> Self {
        Self {
            env,
            user: std::env::var("USER").ok(),
            connected: false,
            echo: true,
        }
    }

    /// Whether output lines are printed as they arrive.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

#[async_trait]
impl Client for LocalhostClient {
    fn host(&self) -> &str {
        "localhost"
    }

    fn identity(&self) -> ClientIdentity {
        ClientIdentity {
            host: "localhost".to_string(),
            user: self.user.clone(),
            port: None,
        }
    }

    async fn connect(&mut self) -> Result<(), ClientError> {
        self.connected = true;
        Ok(())
    }

    async fn run(
        &self,
        command: &str,
        payload: Payload,
        _tty: bool,
    ) -> Result<(), ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected {
                host: self.host().to_string(),
            });
        }

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(format!("{}{}", self.env, command));
        Process::new(self.host(), self.echo).run("bash", cmd, payload).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn refuses_to_run_before_connect() {
        let client = LocalhostClient::new(String::new()).echo(false);
        let err = client.run("true", Payload::Empty, false).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn env_prefix_is_visible_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("host");
        let mut client =
            LocalhostClient::new(r#"export SUP_HOST="localhost";"#.to_string()).echo(false);
        client.connect().await.unwrap();

        let command = format!("echo -n $SUP_HOST > {}", out.display());
        client.run(&command, Payload::Empty, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "localhost");
    }

    #[tokio::test]
    async fn payload_reaches_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("written");
        let mut client = LocalhostClient::new(String::new()).echo(false);
        client.connect().await.unwrap();

        let command = format!("cat > {}", out.display());
        let payload = Payload::Bytes(Arc::from(&b"payload"[..]));
        client.run(&command, payload, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "payload");
    }
}
