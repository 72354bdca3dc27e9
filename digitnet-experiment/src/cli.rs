use crate::error::{Error, Result};
use crate::observer::MongoUrl;
use clap::Parser;
use std::path::PathBuf;

/// Trains the MNIST convolutional classifier as a tracked experiment run.
#[derive(Parser, Debug)]
#[command(name = "digitnet-experiment", version)]
pub struct Cli {
    /// `[run|print_config] [with key=value ...]`
    #[arg(value_name = "COMMAND")]
    pub args: Vec<String>,

    /// Track the run in MongoDB, given as host:port:db_name or db_name
    #[arg(short = 'm', long = "mongo_db", value_name = "URL")]
    pub mongo_db: Option<String>,

    /// Track the run in a directory
    #[arg(short = 'F', long = "file_storage", value_name = "DIR")]
    pub file_storage: Option<PathBuf>,

    /// Do not attach any observer
    #[arg(short = 'u', long)]
    pub unobserved: bool,

    /// JSON file with configuration values, applied before `with` updates
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the MNIST IDX files
    #[arg(long = "data-dir", value_name = "DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Experiment name
    #[arg(short = 'n', long, default_value = "mnist_cnn")]
    pub name: String,

    /// Hide the per-epoch progress bar
    #[arg(long = "no_progress")]
    pub no_progress: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Run,
    PrintConfig,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    pub command: Command,
    pub updates: Vec<String>,
}

/// Splits the positional arguments into a command and its `with` updates. The command defaults
/// to `run`.
pub fn parse_invocation(args: &[String]) -> Result<Invocation> {
    let mut rest = args;
    let command = match rest.first().map(String::as_str) {
        Some("run") => Command::Run,
        Some("print_config") => Command::PrintConfig,
        _ => {
            return parse_updates(rest).map(|updates| Invocation {
                command: Command::Run,
                updates,
            });
        }
    };
    rest = &rest[1..];
    Ok(Invocation {
        command,
        updates: parse_updates(rest)?,
    })
}

fn parse_updates(args: &[String]) -> Result<Vec<String>> {
    match args.split_first() {
        None => Ok(Vec::new()),
        Some((with, updates)) if with == "with" => {
            if let Some(bad) = updates.iter().find(|u| !u.contains('=')) {
                return Err(Error::Config(format!("expected key=value after `with`, got `{bad}`")));
            }
            Ok(updates.to_vec())
        }
        Some((other, _)) => Err(Error::Config(format!(
            "unknown command `{other}`, expected `run`, `print_config` or `with`"
        ))),
    }
}

/// Which observers to attach to a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObserverPlan {
    pub mongo: Option<MongoUrl>,
    pub file_storage: Option<PathBuf>,
}

impl ObserverPlan {
    /// Where the dashboard should look for runs. Falls back to the default database when no
    /// MongoDB observer is attached.
    pub fn dashboard(&self) -> MongoUrl {
        self.mongo.clone().unwrap_or_default()
    }
}

impl Cli {
    /// The default MongoDB observer is used unless another observer is requested or `-u` is set.
    pub fn observer_plan(&self) -> Result<ObserverPlan> {
        if self.unobserved {
            return Ok(ObserverPlan::default());
        }
        let mongo = self.mongo_db.as_deref().map(MongoUrl::parse).transpose()?;
        let file_storage = self.file_storage.clone();
        if mongo.is_none() && file_storage.is_none() {
            return Ok(ObserverPlan {
                mongo: Some(MongoUrl::default()),
                file_storage: None,
            });
        }
        Ok(ObserverPlan { mongo, file_storage })
    }
}
