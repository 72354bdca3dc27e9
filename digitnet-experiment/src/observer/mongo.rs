use crate::error::{Error, Result};
use crate::observer::{group_by_name, CompletedEvent, FailedEvent, HeartbeatEvent, RunObserver, StartedEvent};
use crate::run::{RunId, ScalarEntry};
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneOptions, UpdateOptions};
use mongodb::sync::{Client, Collection};
use std::fmt::{Display, Formatter};

const FORMAT: &str = "MongoObserver-0.7.0";
const DUPLICATE_KEY: i32 = 11000;
const INSERT_ATTEMPTS: usize = 5;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DB_NAME: &str = "sacred_db_1";

/// Address of the tracking database, written `host:port:db_name`, `host:port` or `db_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MongoUrl {
    pub host: String,
    pub port: u16,
    pub db_name: String,
}

impl Default for MongoUrl {
    fn default() -> Self {
        MongoUrl {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_name: DEFAULT_DB_NAME.to_string(),
        }
    }
}

impl MongoUrl {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidMongoUrl(text.to_string());
        let parts: Vec<&str> = text.split(':').collect();
        let port = |p: &str| p.parse::<u16>().map_err(|_| invalid());
        let url = match parts.as_slice() {
            [db_name] if !db_name.is_empty() => MongoUrl {
                db_name: db_name.to_string(),
                ..MongoUrl::default()
            },
            [host, p] if !host.is_empty() => MongoUrl {
                host: host.to_string(),
                port: port(p)?,
                ..MongoUrl::default()
            },
            [host, p, db_name] if !host.is_empty() && !db_name.is_empty() => MongoUrl {
                host: host.to_string(),
                port: port(p)?,
                db_name: db_name.to_string(),
            },
            _ => return Err(invalid()),
        };
        Ok(url)
    }

    /// `host:port` without the database.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Display for MongoUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.db_name)
    }
}

/// Stores runs in a `runs` collection and metric series in a `metrics` collection.
pub struct MongoObserver {
    runs: Collection<Document>,
    metrics: Collection<Document>,
    run_id: Option<RunId>,
}

impl MongoObserver {
    /// Connects to `url`, either `host:port` or a full `mongodb://` connection string.
    pub fn create(url: &str, db_name: &str) -> Result<Self> {
        let uri = if url.starts_with("mongodb://") || url.starts_with("mongodb+srv://") {
            url.to_string()
        } else {
            format!("mongodb://{url}")
        };
        let client = Client::with_uri_str(&uri)?;
        let database = client.database(db_name);
        log::debug!("tracking runs in {uri}/{db_name}");
        Ok(MongoObserver {
            runs: database.collection("runs"),
            metrics: database.collection("metrics"),
            run_id: None,
        })
    }

    pub fn from_url(url: &MongoUrl) -> Result<Self> {
        Self::create(&url.address(), &url.db_name)
    }

    fn next_run_id(&self) -> Result<RunId> {
        let options = FindOneOptions::builder()
            .sort(doc! { "_id": -1 })
            .projection(doc! { "_id": 1 })
            .build();
        let last = self.runs.find_one(None, options)?;
        let last_id = match last.as_ref().and_then(|d| d.get("_id")) {
            Some(Bson::Int64(id)) => *id,
            Some(Bson::Int32(id)) => *id as i64,
            Some(Bson::Double(id)) => *id as i64,
            _ => 0,
        };
        Ok(last_id + 1)
    }

    fn set_fields(&self, fields: Document) -> Result<()> {
        let id = self.run_id.ok_or_else(|| Error::Config("observer used before the run started".into()))?;
        self.runs.update_one(doc! { "_id": id }, doc! { "$set": fields }, None)?;
        Ok(())
    }
}

impl RunObserver for MongoObserver {
    fn started(&mut self, event: &StartedEvent, id: Option<RunId>) -> Result<RunId> {
        let mut attempts = 0;
        loop {
            let run_id = match id {
                Some(id) => id,
                None => self.next_run_id()?,
            };
            match self.runs.insert_one(run_document(event, run_id)?, None) {
                Ok(_) => {
                    self.run_id = Some(run_id);
                    return Ok(run_id);
                }
                Err(err) if id.is_none() && is_duplicate_key(&err) && attempts + 1 < INSERT_ATTEMPTS => {
                    log::debug!("run id {run_id} was taken, retrying");
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn heartbeat(&mut self, event: &HeartbeatEvent) -> Result<()> {
        self.set_fields(doc! {
            "heartbeat": event.beat_time,
            "captured_out": &event.captured_out,
            "result": event.result,
        })
    }

    fn log_metrics(&mut self, entries: &[ScalarEntry]) -> Result<()> {
        let run_id = self.run_id.ok_or_else(|| Error::Config("observer used before the run started".into()))?;
        let upsert = UpdateOptions::builder().upsert(true).build();
        for (name, group) in group_by_name(entries) {
            let steps: Vec<i64> = group.iter().map(|e| e.step as i64).collect();
            let values: Vec<f64> = group.iter().map(|e| e.value).collect();
            let timestamps: Vec<Bson> = group.iter().map(|e| Bson::DateTime(e.timestamp)).collect();
            let update = doc! {
                "$push": {
                    "steps": { "$each": steps },
                    "values": { "$each": values },
                    "timestamps": { "$each": timestamps },
                }
            };
            let result = self
                .metrics
                .update_one(doc! { "run_id": run_id, "name": name }, update, upsert.clone())?;
            if let Some(Bson::ObjectId(metric_id)) = result.upserted_id {
                self.runs.update_one(
                    doc! { "_id": run_id },
                    doc! { "$push": { "metrics": { "id": metric_id.to_hex(), "name": name } } },
                    None,
                )?;
            }
        }
        Ok(())
    }

    fn completed(&mut self, event: &CompletedEvent) -> Result<()> {
        self.set_fields(doc! {
            "stop_time": event.stop_time,
            "result": event.result,
            "status": "COMPLETED",
        })
    }

    fn failed(&mut self, event: &FailedEvent) -> Result<()> {
        self.set_fields(doc! {
            "stop_time": event.fail_time,
            "fail_trace": event.fail_trace.clone(),
            "status": "FAILED",
        })
    }
}

fn run_document(event: &StartedEvent, id: RunId) -> Result<Document> {
    Ok(doc! {
        "_id": id,
        "experiment": { "name": &event.experiment_name },
        "format": FORMAT,
        "command": &event.command,
        "host": to_bson(&event.host)?,
        "start_time": event.start_time,
        "config": to_bson(&event.config)?,
        "meta": to_bson(&event.meta)?,
        "status": "RUNNING",
        "heartbeat": Bson::Null,
        "captured_out": "",
        "result": Bson::Null,
        "info": {},
        "resources": [],
        "artifacts": [],
        "metrics": [],
    })
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[cfg(test)]
mod test {
    use super::{run_document, MongoUrl};
    use crate::error::Error;
    use crate::observer::{HostInfo, RunMeta, StartedEvent};
    use mongodb::bson::{Bson, DateTime};
    use serde_json::json;

    #[test]
    fn test_parse_url() {
        assert_eq!(
            MongoUrl {
                host: "db.local".into(),
                port: 27018,
                db_name: "runs".into()
            },
            MongoUrl::parse("db.local:27018:runs").unwrap()
        );
        let db_only = MongoUrl::parse("experiments").unwrap();
        assert_eq!("127.0.0.1:27017:experiments", db_only.to_string());
        assert_eq!("10.0.0.2:27017", MongoUrl::parse("10.0.0.2:27017").unwrap().address());
        assert_eq!("127.0.0.1:27017:sacred_db_1", MongoUrl::default().to_string());
    }

    #[test]
    fn test_parse_invalid_url() {
        for text in ["", "host:port:db", "a:1:b:c", ":27017:db", "host:27017:"] {
            assert!(matches!(MongoUrl::parse(text), Err(Error::InvalidMongoUrl(_))), "{text}");
        }
    }

    #[test]
    fn test_run_document() {
        let event = StartedEvent {
            experiment_name: "mnist_cnn".into(),
            command: "main".into(),
            host: HostInfo {
                hostname: "box".into(),
                os: "linux".into(),
                arch: "x86_64".into(),
                cpu_count: 8,
            },
            start_time: DateTime::from_millis(1_000),
            config: json!({"batch_size": 128, "optimizer": {"rho": 0.95}}),
            meta: RunMeta {
                command: "main".into(),
                config_updates: json!({"epochs": 1}),
            },
        };
        let doc = run_document(&event, 7).unwrap();
        assert_eq!(Some(&Bson::Int64(7)), doc.get("_id"));
        assert_eq!("mnist_cnn", doc.get_document("experiment").unwrap().get_str("name").unwrap());
        assert_eq!("RUNNING", doc.get_str("status").unwrap());
        assert_eq!("MongoObserver-0.7.0", doc.get_str("format").unwrap());
        assert_eq!("box", doc.get_document("host").unwrap().get_str("hostname").unwrap());
        let config = doc.get_document("config").unwrap();
        assert_eq!(0.95, config.get_document("optimizer").unwrap().get_f64("rho").unwrap());
        assert!(doc.get_array("metrics").unwrap().is_empty());
        assert_eq!(Some(&Bson::Null), doc.get("result"));
    }
}
