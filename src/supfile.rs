//! The `Supfile`: networks of hosts, named commands, and targets that chain
//! commands together.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::shell;


#[derive(Clone, Debug, Default, Deserialize)]
pub struct Supfile {
    #[serde(default)]
    pub env: EnvList,
    #[serde(default)]
    pub networks: BTreeMap<String, Network>,
    #[serde(default)]
    pub commands: BTreeMap<String, CommandSpec>,
    #[serde(default)]
    pub targets: BTreeMap<String, Vec<String>>,
}


#[derive(Clone, Debug, Default, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub env: EnvList,
    #[serde(default)]
    pub hosts: Vec<String>,
}


/// One step: any mix of upload, template, script, local and run, plus the
/// policy for spreading it over the network's clients.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub upload: Vec<Upload>,
    #[serde(default)]
    pub template: Option<TemplateSpec>,
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub serial: usize,
    #[serde(default)]
    pub stdin: bool,
}


#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Upload {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub exclude: Vec<String>,
}


#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    pub src: PathBuf,
    pub dst: String,
    #[serde(default)]
    pub vars: Option<PathBuf>,
}


/// Environment variables in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvList(Vec<(String, String)>);

impl EnvList {
    /// Set `key`, replacing an earlier value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn merge(&mut self, other: &EnvList) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `export K=V;` prefix every client prepends to its commands.
    pub fn exports(&self) -> String {
        self.iter().map(|(k, v)| shell::export(k, v)).collect()
    }
}

impl<'de> Deserialize<'de> for EnvList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
        let mut env = EnvList::default();
        for (key, value) in mapping {
            let key = scalar(&key)
                .ok_or_else(|| D::Error::custom("env keys must be scalars"))?;
            let value = scalar(&value)
                .ok_or_else(|| D::Error::custom(format!("env {}: value must be a scalar", key)))?;
            env.set(key, value);
        }
        Ok(env)
    }
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}


impl Supfile {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|err| Error::io("can't read Supfile", path, err))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, Error> {
        serde_yaml::from_str(data).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn network(&self, name: &str) -> Result<&Network, Error> {
        self.networks
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown network {:?}", name)))
    }

    /// Expand command and target names into the commands to run, in order.
    pub fn resolve<'a, S: AsRef<str>>(
        &'a self,
        names: &[S],
    ) -> Result<Vec<(&'a str, &'a CommandSpec)>, Error> {
        let mut commands = Vec::new();
        for name in names {
            let name = name.as_ref();
            if let Some(target) = self.targets.get(name) {
                for command in target {
                    commands.push(self.command(command).map_err(|_| {
                        Error::Config(format!(
                            "target {:?}: unknown command {:?}",
                            name, command
                        ))
                    })?);
                }
            } else {
                commands.push(self.command(name)?);
            }
        }
        Ok(commands)
    }

    fn command(&self, name: &str) -> Result<(&str, &CommandSpec), Error> {
        self.commands
            .get_key_value(name)
            .map(|(name, spec)| (name.as_str(), spec))
            .ok_or_else(|| Error::Config(format!("unknown command or target {:?}", name)))
    }
}
