//! Boundary to the external SAR toolkit executables

use crate::types::{StackError, StackResult};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A single command line argument.
///
/// Absent arguments are rendered as `-`, the toolkit's placeholder for
/// "not given".
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Absent,
    Value(String),
}

impl Arg {
    pub fn render(&self) -> String {
        match self {
            Arg::Absent => "-".to_string(),
            Arg::Value(v) => v.clone(),
        }
    }

    /// Integer flag representation used by the toolkit (`1`/`0`)
    pub fn flag(value: bool) -> Self {
        Arg::Value(if value { "1" } else { "0" }.to_string())
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Value(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Value(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Value(v.clone())
    }
}

impl From<&Path> for Arg {
    fn from(v: &Path) -> Self {
        Arg::Value(v.display().to_string())
    }
}

impl From<&PathBuf> for Arg {
    fn from(v: &PathBuf) -> Self {
        Arg::from(v.as_path())
    }
}

impl From<PathBuf> for Arg {
    fn from(v: PathBuf) -> Self {
        Arg::from(v.as_path())
    }
}

macro_rules! arg_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Value(v.to_string())
                }
            }
        )*
    };
}

arg_from_display!(i32, i64, u32, u64, usize, f64);

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Arg::Absent)
    }
}

/// Build a `Vec<Arg>` from heterogeneous values
#[macro_export]
macro_rules! args {
    ($($a:expr),* $(,)?) => {
        vec![$($crate::io::command::Arg::from($a)),*]
    };
}

/// Runs an executable and returns its combined stdout and stderr
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        program: &Path,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> StackResult<String>;
}

/// Executor spawning real processes, with an optional wall-clock limit
pub struct SystemExecutor {
    runtime: tokio::runtime::Runtime,
    timeout: Option<Duration>,
}

impl SystemExecutor {
    pub fn new(timeout: Option<Duration>) -> StackResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        Ok(Self { runtime, timeout })
    }
}

impl Executor for SystemExecutor {
    fn execute(
        &self,
        program: &Path,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> StackResult<String> {
        let mut command = tokio::process::Command::new(program);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        log::debug!("Executing: {} {}", program.display(), args.join(" "));

        let output = self.runtime.block_on(async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                    Ok(result) => result.map_err(StackError::Io),
                    Err(_) => Err(StackError::CommandTimeout {
                        command: program.display().to_string(),
                        timeout: limit,
                    }),
                },
                None => command.output().await.map_err(StackError::Io),
            }
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(StackError::Command {
                command: program.display().to_string(),
                args: args.join(" "),
                output: combined,
            });
        }

        Ok(combined)
    }
}

/// Lookup table from executable name to its location.
///
/// Built once at startup and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct CommandResolver {
    commands: HashMap<String, PathBuf>,
}

impl CommandResolver {
    /// Index every file under `<root>/<module>/{bin,scripts}/`
    pub fn from_toolkit<P: AsRef<Path>>(root: P, modules: &[String]) -> StackResult<Self> {
        let root = root.as_ref();
        let mut commands = HashMap::new();

        for module in modules {
            for dir in ["bin", "scripts"] {
                let pattern = root.join(module).join(dir).join("*");
                let pattern = pattern.to_string_lossy();

                let entries = glob::glob(&pattern).map_err(|e| {
                    StackError::Config(format!("invalid toolkit pattern '{}': {}", pattern, e))
                })?;

                for entry in entries {
                    let path = entry.map_err(|e| StackError::Io(e.into()))?;
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        commands.insert(name.to_string(), path.clone());
                    }
                }
            }
        }

        log::info!(
            "Indexed {} toolkit executables under {}",
            commands.len(),
            root.display()
        );

        Ok(Self { commands })
    }

    /// Build a resolver from explicit name/path pairs
    pub fn from_entries<I, S, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            commands: entries
                .into_iter()
                .map(|(name, path)| (name.into(), path.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn resolve(&self, name: &str) -> StackResult<&Path> {
        self.commands
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| StackError::UnknownCommand(name.to_string()))
    }

    /// First available executable among the alternatives
    pub fn resolve_any(&self, names: &[&str]) -> StackResult<&Path> {
        names
            .iter()
            .find_map(|name| self.commands.get(*name))
            .map(PathBuf::as_path)
            .ok_or_else(|| StackError::UnknownCommand(names.join("' or '")))
    }
}

/// Resolver and executor bundled together, shared by reference
#[derive(Clone)]
pub struct CommandRunner {
    resolver: CommandResolver,
    executor: Arc<dyn Executor>,
}

impl CommandRunner {
    pub fn new(resolver: CommandResolver, executor: Arc<dyn Executor>) -> Self {
        Self { resolver, executor }
    }

    /// Run a named command in the current directory
    pub fn call(&self, name: &str, args: &[Arg]) -> StackResult<String> {
        let program = self.resolver.resolve(name)?;
        self.run(program, args, None)
    }

    /// Run a named command inside `dir`
    pub fn call_in(&self, dir: &Path, name: &str, args: &[Arg]) -> StackResult<String> {
        let program = self.resolver.resolve(name)?;
        self.run(program, args, Some(dir))
    }

    /// Run the first available command among the alternatives
    pub fn call_any(&self, names: &[&str], args: &[Arg]) -> StackResult<String> {
        let program = self.resolver.resolve_any(names)?;
        self.run(program, args, None)
    }

    fn run(&self, program: &Path, args: &[Arg], dir: Option<&Path>) -> StackResult<String> {
        let rendered: Vec<String> = args.iter().map(Arg::render).collect();
        self.executor.execute(program, &rendered, dir)
    }
}
