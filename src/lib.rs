pub mod client;
pub mod command;
mod error;
mod flock;
mod process;
mod shell;
mod supfile;
mod tasks;
mod template;
mod upload;

pub use client::{Client, ClientError, ClientIdentity, LocalhostClient, Payload, SshClient};
pub use error::{Error, TaskError};
pub use flock::Flock;
pub use process::Process;
pub use supfile::{CommandSpec, EnvList, Network, Supfile, TemplateSpec, Upload};
pub use tasks::{CommandTask, Partition, Task, TaskInput, TaskKind, TemplateTask};
pub use template::{Template, Vars};
