use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use docgate_protocol::{Command, Reply, STREAM_AUTO_ID};
use docgate_types::HashRecord;

use crate::error::StoreResult;
use crate::traits::Executor;

/// One stream entry: backend id and its field-value pairs in insertion order.
pub type StreamEntry = (String, Vec<(String, String)>);

enum Value {
    Hash(HashRecord),
    Stream(Vec<StreamEntry>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Stream(_) => "stream",
        }
    }
}

#[derive(Default)]
struct Keyspace {
    values: HashMap<String, Value>,
    last_id: (u64, u64),
}

/// In-process backend with the hash and stream semantics the gateway uses.
///
/// Understands `PING`, `HMSET`, `HSET`, `HGETALL`, `XADD` (auto id only) and
/// `XLEN`, with a single shared keyspace (type clashes answer `WRONGTYPE`).
/// Every executed command name is recorded, and replies can be replaced with
/// errors per command, which is what tests use to observe and break the
/// gateway's backend traffic.
pub struct InMemoryBackend {
    keyspace: Mutex<Keyspace>,
    log: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, String>>,
    executed: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            log: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            executed: AtomicUsize::new(0),
        }
    }

    /// Answer every future `command` with the error reply `message`.
    pub fn fail_command(&self, command: &str, message: &str) {
        self.failures
            .lock()
            .expect("lock poisoned")
            .insert(command.to_ascii_uppercase(), message.to_string());
    }

    /// Stop injecting errors.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock poisoned").clear();
    }

    /// Number of commands executed so far.
    pub fn command_count(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Names of the commands executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().expect("lock poisoned").clone()
    }

    /// The hash stored at `key`, if any.
    pub fn hash(&self, key: &str) -> Option<HashRecord> {
        match self.keyspace.lock().expect("lock poisoned").values.get(key) {
            Some(Value::Hash(record)) => Some(record.clone()),
            _ => None,
        }
    }

    /// Entries of the stream `name`, oldest first.
    pub fn stream(&self, name: &str) -> Vec<StreamEntry> {
        match self.keyspace.lock().expect("lock poisoned").values.get(name) {
            Some(Value::Stream(entries)) => entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Run `command` against the keyspace and build the reply.
    pub fn apply(&self, command: &Command) -> Reply {
        let name = command.name();
        self.executed.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("lock poisoned").push(name.clone());

        if let Some(message) = self.failures.lock().expect("lock poisoned").get(&name) {
            return Reply::Error(message.clone());
        }

        let params: Vec<String> = command
            .params()
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect();
        let mut keyspace = self.keyspace.lock().expect("lock poisoned");

        match (name.as_str(), params.as_slice()) {
            ("PING", []) => Reply::Simple("PONG".into()),
            ("PING", [message]) => Reply::bulk(message),
            ("HMSET" | "HSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let record = match keyspace
                    .values
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(HashRecord::new()))
                {
                    Value::Hash(record) => record,
                    other => return wrong_type(other),
                };
                let mut added = 0;
                for pair in pairs.chunks(2) {
                    if record.insert(pair[0].clone(), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                if name == "HSET" {
                    Reply::Integer(added)
                } else {
                    Reply::ok()
                }
            }
            ("HGETALL", [key]) => match keyspace.values.get(key) {
                None => Reply::Array(Some(Vec::new())),
                Some(Value::Hash(record)) => Reply::Array(Some(
                    record
                        .iter()
                        .flat_map(|(f, v)| [Reply::bulk(f), Reply::bulk(v)])
                        .collect(),
                )),
                Some(other) => wrong_type(other),
            },
            ("XADD", [stream, id, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                if id != STREAM_AUTO_ID {
                    return Reply::Error("ERR only auto-generated stream ids are supported".into());
                }
                let entry_id = next_stream_id(&mut keyspace.last_id);
                let entries = match keyspace
                    .values
                    .entry(stream.clone())
                    .or_insert_with(|| Value::Stream(Vec::new()))
                {
                    Value::Stream(entries) => entries,
                    other => return wrong_type(other),
                };
                let fields = pairs
                    .chunks(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect();
                entries.push((entry_id.clone(), fields));
                Reply::bulk(entry_id)
            }
            ("XLEN", [stream]) => match keyspace.values.get(stream) {
                None => Reply::Integer(0),
                Some(Value::Stream(entries)) => Reply::Integer(entries.len() as i64),
                Some(other) => wrong_type(other),
            },
            ("PING" | "HMSET" | "HSET" | "HGETALL" | "XADD" | "XLEN", _) => Reply::Error(format!(
                "ERR wrong number of arguments for '{}' command",
                name.to_ascii_lowercase()
            )),
            _ => Reply::Error(format!("ERR unknown command '{name}'")),
        }
    }
}

fn wrong_type(value: &Value) -> Reply {
    Reply::Error(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value ({})",
        value.kind()
    ))
}

/// `<millis>-<seq>`, strictly increasing even within one millisecond.
fn next_stream_id(last: &mut (u64, u64)) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    *last = if now > last.0 { (now, 0) } else { (last.0, last.1 + 1) };
    format!("{}-{}", last.0, last.1)
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for InMemoryBackend {
    async fn execute(&self, command: Command) -> StoreResult<Reply> {
        Ok(self.apply(&command))
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.keyspace.lock().expect("lock poisoned").values.len();
        f.debug_struct("InMemoryBackend")
            .field("keys", &keys)
            .field("commands", &self.command_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hset_counts_new_fields() {
        let backend = InMemoryBackend::new();
        let reply = backend.apply(&Command::new("HSET").arg("k").arg("a").arg("1").arg("b").arg("2"));
        assert_eq!(reply, Reply::Integer(2));
        let reply = backend.apply(&Command::new("HSET").arg("k").arg("a").arg("9"));
        assert_eq!(reply, Reply::Integer(0));
        assert_eq!(backend.hash("k").unwrap()["a"], "9");
    }

    #[test]
    fn hmset_needs_field_value_pairs() {
        let backend = InMemoryBackend::new();
        let reply = backend.apply(&Command::new("HMSET").arg("k"));
        assert!(matches!(reply, Reply::Error(m) if m.contains("wrong number of arguments")));
        let reply = backend.apply(&Command::new("HMSET").arg("k").arg("a"));
        assert!(matches!(reply, Reply::Error(_)));
        assert!(backend.hash("k").is_none());
    }

    #[test]
    fn keyspace_is_shared_between_types() {
        let backend = InMemoryBackend::new();
        backend.apply(&Command::xadd("s", [("a", "1")]));
        let reply = backend.apply(&Command::hmset("s", [("a", "1")]));
        assert!(matches!(reply, Reply::Error(m) if m.starts_with("WRONGTYPE")));
        let reply = backend.apply(&Command::hgetall("s"));
        assert!(matches!(reply, Reply::Error(m) if m.starts_with("WRONGTYPE")));
    }

    #[test]
    fn stream_ids_strictly_increase() {
        let backend = InMemoryBackend::new();
        let mut ids = Vec::new();
        for i in 0..50 {
            let reply = backend.apply(&Command::xadd("s", [("i", i.to_string())]));
            ids.push(reply.into_string().unwrap());
        }
        let parsed: Vec<(u64, u64)> = ids
            .iter()
            .map(|id| {
                let (ms, seq) = id.split_once('-').unwrap();
                (ms.parse().unwrap(), seq.parse().unwrap())
            })
            .collect();
        assert!(parsed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(backend.apply(&Command::new("XLEN").arg("s")), Reply::Integer(50));
    }

    #[test]
    fn xadd_rejects_explicit_ids() {
        let backend = InMemoryBackend::new();
        let reply = backend.apply(&Command::new("XADD").arg("s").arg("1-1").arg("a").arg("b"));
        assert!(matches!(reply, Reply::Error(_)));
        assert!(backend.stream("s").is_empty());
    }

    #[test]
    fn unknown_commands_are_errors() {
        let backend = InMemoryBackend::new();
        let reply = backend.apply(&Command::new("FLUSHALL"));
        assert!(matches!(reply, Reply::Error(m) if m.contains("unknown command")));
    }

    #[test]
    fn injected_failures_apply_per_command() {
        let backend = InMemoryBackend::new();
        backend.fail_command("xadd", "ERR stream down");
        assert!(matches!(backend.apply(&Command::xadd("s", [("a", "1")])), Reply::Error(_)));
        assert_eq!(backend.apply(&Command::hmset("k", [("a", "1")])), Reply::ok());

        backend.clear_failures();
        assert!(matches!(backend.apply(&Command::xadd("s", [("a", "1")])), Reply::Bulk(Some(_))));
        assert_eq!(backend.command_count(), 3);
        assert_eq!(backend.commands(), vec!["XADD", "HMSET", "XADD"]);
    }
}
