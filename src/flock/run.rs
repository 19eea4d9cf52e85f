use futures::future::join_all;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::client::{Client, Payload};
use crate::error::{Error, TaskError};
use crate::flock::Flock;
use crate::tasks::{Task, TaskInput};

const STDIN_CHUNK: usize = 8192;
const STDIN_BACKLOG: usize = 16;


/// Run `tasks` in order. Within a task every client runs at once and all
/// of them finish before the next task starts.
pub async fn run_tasks(flock: &Flock, tasks: &[Task]) -> Result<(), Error> {
    let mut failures = vec![];

    for (index, task) in tasks.iter().enumerate() {
        let errors = run_task(task).await;
        if errors.is_empty() {
            continue;
        }

        for err in &errors {
            warn!(task = %task.id(), host = %err.host, reason = %err.reason, "task failed");
        }
        failures.extend(errors);

        if flock.fail_fast {
            let skipped = tasks.len() - index - 1;
            if skipped > 0 {
                warn!(skipped, "not starting remaining tasks");
            }
            break;
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Failed(failures))
    }
}


async fn run_task(task: &Task) -> Vec<TaskError> {
    info!(
        task = %task.id(),
        clients = task.clients().len(),
        tty = task.tty(),
        "running {:?}",
        task.run()
    );

    let stdin = matches!(task.static_input(), Ok(TaskInput::Stdin));
    let mut senders = vec![];

    let mut running = JoinSet::new();
    for client in task.clients() {
        let task = task.clone();
        let client = client.clone();
        let stream = stdin.then(|| {
            let (tx, rx) = mpsc::channel(STDIN_BACKLOG);
            senders.push(tx);
            rx
        });
        running.spawn(async move {
            let result = dispatch(&task, client.as_ref(), stream).await;
            (client.host().to_string(), result)
        });
    }

    let pump = (!senders.is_empty())
        .then(|| tokio::spawn(pump_stdin(tokio::io::stdin(), senders)));

    let mut errors = vec![];
    while let Some(joined) = running.join_next().await {
        let (host, reason) = match joined {
            Ok((_, Ok(()))) => continue,
            // The host is already on the TaskError.
            Ok((host, Err(Error::Client(err)))) => (host, err.to_string()),
            Ok((host, Err(err))) => (host, err.to_string()),
            Err(err) => ("<unknown>".to_string(), err.to_string()),
        };
        errors.push(TaskError {
            task: task.clone(),
            host,
            reason,
        });
    }

    if let Some(pump) = pump {
        pump.abort();
    }
    errors
}


async fn dispatch(
    task: &Task,
    client: &dyn Client,
    stream: Option<mpsc::Receiver<Arc<[u8]>>>,
) -> Result<(), Error> {
    let payload = match task.renderer() {
        Some(renderer) => Payload::Bytes(renderer.render_for(client)?),
        None => match task.static_input()? {
            TaskInput::None => Payload::Empty,
            TaskInput::Bytes(bytes) => Payload::Bytes(bytes.clone()),
            TaskInput::Stdin => stream.map_or(Payload::Empty, Payload::Stream),
        },
    };

    debug!(task = %task.id(), host = client.host(), "dispatching");
    client.run(&task.run(), payload, task.tty()).await?;
    Ok(())
}


/// Copy `reader` to every sender. A full channel holds the pump back
/// until that client catches up; a closed one is dropped from the set.
async fn pump_stdin<R>(mut reader: R, mut senders: Vec<mpsc::Sender<Arc<[u8]>>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; STDIN_CHUNK];
    while !senders.is_empty() {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "reading stdin failed");
                break;
            }
        };

        let chunk: Arc<[u8]> = Arc::from(&buf[..n]);
        let sent = join_all(senders.iter().map(|tx| tx.send(chunk.clone()))).await;
        senders = senders
            .into_iter()
            .zip(sent)
            .filter_map(|(tx, sent)| sent.ok().map(|()| tx))
            .collect();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn collect(mut rx: mpsc::Receiver<Arc<[u8]>>, pause: Duration) -> Vec<u8> {
        let mut out = vec![];
        while let Some(chunk) = rx.recv().await {
            out.extend_from_slice(&chunk);
            tokio::time::sleep(pause).await;
        }
        out
    }

    #[tokio::test]
    async fn stdin_pump_waits_for_slow_clients() {
        let input: Vec<u8> = (0..300 * STDIN_CHUNK).map(|i| (i % 251) as u8).collect();

        let (fast_tx, fast_rx) = mpsc::channel(2);
        let (slow_tx, slow_rx) = mpsc::channel(2);
        let fast = tokio::spawn(collect(fast_rx, Duration::ZERO));
        let slow = tokio::spawn(collect(slow_rx, Duration::from_millis(1)));

        pump_stdin(std::io::Cursor::new(input.clone()), vec![fast_tx, slow_tx]).await;

        assert_eq!(fast.await.unwrap(), input);
        assert_eq!(slow.await.unwrap(), input);
    }

    #[tokio::test]
    async fn stdin_pump_drops_finished_clients() {
        let input = vec![7u8; 20 * STDIN_CHUNK];

        let (gone_tx, gone_rx) = mpsc::channel::<Arc<[u8]>>(1);
        drop(gone_rx);
        let (live_tx, live_rx) = mpsc::channel(1);
        let live = tokio::spawn(collect(live_rx, Duration::ZERO));

        tokio::time::timeout(
            Duration::from_secs(5),
            pump_stdin(std::io::Cursor::new(input.clone()), vec![gone_tx, live_tx]),
        )
        .await
        .unwrap();

        assert_eq!(live.await.unwrap(), input);
    }
}
