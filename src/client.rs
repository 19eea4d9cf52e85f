use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

mod local;
mod ssh;

pub use local::LocalhostClient;
pub use ssh::SshClient;


#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        host: String,
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{source}")]
    Io {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process exited with {status}")]
    Exit {
        host: String,
        status: std::process::ExitStatus,
    },

    #[error("connect failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("not connected")]
    NotConnected { host: String },

    #[error("invalid host address {0:?}")]
    Address(String),
}

impl ClientError {
    /// The host the error happened on. Messages leave it out so callers
    /// that already name the host don't repeat it.
    pub fn host(&self) -> Option<&str> {
        match self {
            ClientError::Spawn { host, .. }
            | ClientError::Io { host, .. }
            | ClientError::Exit { host, .. }
            | ClientError::Connect { host, .. }
            | ClientError::NotConnected { host } => Some(host),
            ClientError::Address(_) => None,
        }
    }
}


/// Bytes handed to a client's standard input. A stream is read until its
/// sender closes; the sender waits on a full channel, so nothing is skipped.
#[derive(Debug)]
pub enum Payload {
    Empty,
    Bytes(Arc<[u8]>),
    Stream(mpsc::Receiver<Arc<[u8]>>),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}


/// What a template sees as `client`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ClientIdentity {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
}


#[async_trait]
pub trait Client: fmt::Debug + Send + Sync {
    fn host(&self) -> &str;

    fn identity(&self) -> ClientIdentity;

    async fn connect(&mut self) -> Result<(), ClientError>;

    /// Run `command`, feeding `payload` to its standard input. A non-zero
    /// exit status is an error.
    async fn run(
        &self,
        command: &str,
        payload: Payload,
        tty: bool,
    ) -> Result<(), ClientError>;
}


/// `[user@]host[:port]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl Address {
    pub fn parse(addr: &str) -> Result<Self, ClientError> {
        let invalid = || ClientError::Address(addr.to_string());

        let (user, rest) = match addr.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(invalid()),
            None => (None, addr),
        };

        let parse_port = |port: &str| port.parse::<u16>().map_err(|_| invalid());

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            // [v6] or [v6]:port
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            match tail {
                "" => (host, None),
                _ => {
                    let port = tail.strip_prefix(':').ok_or_else(invalid)?;
                    (host, Some(parse_port(port)?))
                }
            }
        } else if rest.matches(':').count() > 1 {
            // Bare IPv6; a port needs the bracketed form.
            (rest, None)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, Some(parse_port(port)?)),
                None => (rest, None),
            }
        };

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self { user, host: host.to_string(), port })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
            && self.user.is_none()
            && self.port.is_none()
    }
}


/// Build an unconnected client for `addr`. `env` is the shell prefix
/// prepended to every command the client runs.
pub fn for_address(addr: &str, env: &str) -> Result<Box<dyn Client>, ClientError> {
    let address = Address::parse(addr)?;
    let env = format!("{}{}", env, crate::shell::export("SUP_HOST", &address.host));
    if address.is_local() {
        Ok(Box::new(LocalhostClient::new(env)))
    } else {
        Ok(Box::new(SshClient::new(address, env)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host() {
        let addr = Address::parse("web1.example.com").unwrap();
        assert_eq!(addr.host, "web1.example.com");
        assert_eq!(addr.user, None);
        assert_eq!(addr.port, None);
    }

    #[test]
    fn parses_user_and_port() {
        let addr = Address::parse("deploy@10.0.0.5:2222").unwrap();
        assert_eq!(addr.user.as_deref(), Some("deploy"));
        assert_eq!(addr.host, "10.0.0.5");
        assert_eq!(addr.port, Some(2222));
    }

    #[test]
    fn parses_ipv6_hosts() {
        let addr = Address::parse("::1").unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, None);
        assert!(addr.is_local());

        let addr = Address::parse("[::1]:2222").unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, Some(2222));
        assert!(!addr.is_local());

        let addr = Address::parse("deploy@[fe80::1]").unwrap();
        assert_eq!(addr.user.as_deref(), Some("deploy"));
        assert_eq!(addr.host, "fe80::1");
        assert_eq!(addr.port, None);

        assert!(Address::parse("[::1").is_err());
        assert!(Address::parse("[::1]2222").is_err());
        assert!(Address::parse("[]:22").is_err());
    }

    #[test]
    fn error_messages_leave_the_host_out() {
        let err = ClientError::Connect {
            host: "web1".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "connect failed: boom");
        assert_eq!(err.host(), Some("web1"));
        assert_eq!(ClientError::Address("x y".to_string()).host(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("@host").is_err());
        assert!(Address::parse("host:notaport").is_err());
        assert!(Address::parse("two words").is_err());
    }

    #[test]
    fn localhost_gets_local_client() {
        let client = for_address("localhost", "").unwrap();
        assert_eq!(client.host(), "localhost");
        assert!(format!("{:?}", client).contains("LocalhostClient"));

        let client = for_address("::1", "").unwrap();
        assert!(format!("{:?}", client).contains("LocalhostClient"));

        let client = for_address("deploy@web1", "").unwrap();
        assert_eq!(client.host(), "web1");
        assert!(format!("{:?}", client).contains("SshClient"));
    }
}
