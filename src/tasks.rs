use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Error;
use crate::shell;
use crate::template::{Template, Vars};


/// Where a command task's standard input comes from.
#[derive(Clone, Debug)]
pub enum TaskInput {
    None,
    Bytes(Arc<[u8]>),
    Stdin,
}


#[derive(Debug)]
pub struct CommandTask {
    run: String,
    input: TaskInput,
    tty: bool,
}

impl CommandTask {
    pub fn new(run: String, input: TaskInput, tty: bool) -> Self {
        Self { run, input, tty }
    }
}


/// Writes a template, rendered separately for each client, to `dst`.
#[derive(Debug)]
pub struct TemplateTask {
    template: Template,
    dst: String,
    vars: Vars,
}

impl TemplateTask {
    pub fn new(template: Template, dst: String, vars: Vars) -> Self {
        Self { template, dst, vars }
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn render_for(&self, client: &dyn Client) -> Result<Arc<[u8]>, Error> {
        self.template.render(&client.identity(), &self.vars)
    }
}


/// The immutable part of a task. Every batch cut from the same command
/// shares one of these.
#[derive(Debug)]
pub enum TaskKind {
    Command(CommandTask),
    Template(TemplateTask),
}

impl TaskKind {
    pub fn run(&self) -> String {
        match self {
            TaskKind::Command(task) => task.run.clone(),
            TaskKind::Template(task) => format!("cat > {}", shell::quote(&task.dst)),
        }
    }

    pub fn tty(&self) -> bool {
        match self {
            TaskKind::Command(task) => task.tty,
            TaskKind::Template(_) => false,
        }
    }
}


/// One client-bound unit of dispatch.
#[derive(Clone)]
pub struct Task {
    id: Uuid,
    kind: Arc<TaskKind>,
    clients: Vec<Arc<dyn Client>>,
}

impl Task {
    pub fn new(kind: Arc<TaskKind>, clients: Vec<Arc<dyn Client>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            clients,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn run(&self) -> String {
        self.kind.run()
    }

    pub fn clients(&self) -> &[Arc<dyn Client>] {
        &self.clients
    }

    pub fn tty(&self) -> bool {
        self.kind.tty()
    }

    /// The per-client renderer, if this task needs one.
    pub fn renderer(&self) -> Option<&TemplateTask> {
        match &*self.kind {
            TaskKind::Template(task) => Some(task),
            TaskKind::Command(_) => None,
        }
    }

    /// The input shared by every client. Template tasks have none.
    pub fn static_input(&self) -> Result<&TaskInput, Error> {
        match &*self.kind {
            TaskKind::Command(task) => Ok(&task.input),
            TaskKind::Template(_) => Err(Error::InputForm(
                "template tasks render their input per client",
            )),
        }
    }

    pub fn input_for_client(&self, client: &dyn Client) -> Result<Arc<[u8]>, Error> {
        self.renderer()
            .ok_or(Error::InputForm("command tasks have one static input"))?
            .render_for(client)
    }

    pub fn shares_kind_with(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hosts: Vec<&str> = self.clients.iter().map(|c| c.host()).collect();
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("run", &self.run())
            .field("tty", &self.tty())
            .field("clients", &hosts)
            .finish()
    }
}


/// How a command's work is spread over its clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    /// First client only.
    Once,
    /// Consecutive batches of this size, one after another.
    Serial(usize),
    /// Everyone at once.
    All,
}

impl Partition {
    pub fn new(once: bool, serial: usize) -> Self {
        if once {
            Partition::Once
        } else if serial > 0 {
            Partition::Serial(serial)
        } else {
            Partition::All
        }
    }

    /// Cut `clients` into order-preserving, non-empty groups, one per task.
    pub fn groups(self, clients: &[Arc<dyn Client>]) -> Vec<Vec<Arc<dyn Client>>> {
        if clients.is_empty() {
            return vec![];
        }
        match self {
            Partition::Once => vec![vec![clients[0].clone()]],
            Partition::Serial(0) | Partition::All => vec![clients.to_vec()],
            Partition::Serial(n) => clients.chunks(n).map(<[_]>::to_vec).collect(),
        }
    }

    /// One task per group, all sharing `kind`.
    pub fn tasks(self, kind: TaskKind, clients: &[Arc<dyn Client>]) -> Vec<Task> {
        let kind = Arc::new(kind);
        self.groups(clients)
            .into_iter()
            .map(|group| Task::new(kind.clone(), group))
            .collect()
    }
}
