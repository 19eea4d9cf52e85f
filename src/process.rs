use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::debug;

use crate::client::{ClientError, Payload};


/// One child process run on behalf of a client: feeds its stdin from a
/// payload and streams its output line by line as it arrives.
#[derive(Debug)]
pub struct Process {
    host: String,
    echo: bool,
}

impl Process {
    pub fn new(host: impl Into<String>, echo: bool) -> Self {
        Self {
            host: host.into(),
            echo,
        }
    }

    pub async fn run(
        &self,
        program: &'static str,
        mut command: Command,
        payload: Payload,
    ) -> Result<(), ClientError> {
        let stdin = if payload.is_empty() {
            std::process::Stdio::null()
        } else {
            std::process::Stdio::piped()
        };

        let mut child = command
            .stdin(stdin)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClientError::Spawn {
                host: self.host.clone(),
                program,
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let feeding = feed(stdin, payload);
        tokio::pin!(feeding);
        let mut fed = false;

        let drain = async {
            let (out, err) = tokio::join!(
                self.pump(stdout, Output::Stdout),
                self.pump(stderr, Output::Stderr),
            );
            out?;
            err?;
            child.wait().await
        };
        tokio::pin!(drain);

        // Stop feeding once the process is gone; a terminal stdin may never
        // reach EOF on its own.
        let status = loop {
            tokio::select! {
                result = &mut feeding, if !fed => {
                    fed = true;
                    if let Err(err) = result {
                        debug!(host = %self.host, error = %err, "stdin feed ended early");
                    }
                }
                status = &mut drain => break status,
            }
        };

        let status = status.map_err(|source| ClientError::Io {
            host: self.host.clone(),
            source,
        })?;

        if !status.success() {
            return Err(ClientError::Exit {
                host: self.host.clone(),
                status,
            });
        }
        Ok(())
    }

    async fn pump<R>(
        &self,
        reader: Option<R>,
        wrap: fn(String) -> Output,
    ) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let Some(reader) = reader else {
            return Ok(());
        };

        let mut lines = tokio::io::BufReader::new(reader).split(b'\n');
        while let Some(line) = lines.next_segment().await? {
            if !self.echo {
                continue;
            }
            let line = String::from_utf8_lossy(&line)
                .trim_end_matches('\r')
                .to_string();
            match wrap(line) {
                Output::Stdout(line) => println!("{} | {}", self.host, line),
                Output::Stderr(line) => eprintln!("{} | {}", self.host, line),
            }
        }
        Ok(())
    }
}


async fn feed(stdin: Option<ChildStdin>, payload: Payload) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    let written = match payload {
        Payload::Empty => Ok(()),
        Payload::Bytes(bytes) => stdin.write_all(&bytes).await,
        Payload::Stream(mut rx) => loop {
            match rx.recv().await {
                Some(chunk) => {
                    if let Err(err) = stdin.write_all(&chunk).await {
                        break Err(err);
                    }
                }
                None => break Ok(()),
            }
        },
    };

    match written {
        // The command finished without reading all of its input.
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err),
        Ok(()) => stdin.shutdown().await,
    }
}


#[derive(Clone, Debug, PartialEq, Eq)]
enum Output {
    Stdout(String),
    Stderr(String),
}
