use std::fmt;

use bytes::Bytes;

use crate::error::{ProtocolError, ProtocolResult};

/// Stream entry id that asks the backend to assign one.
pub const STREAM_AUTO_ID: &str = "*";

/// A backend command: the command name followed by its arguments, all sent
/// as bulk strings.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            args: vec![Bytes::copy_from_slice(name.as_bytes())],
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    /// Append field-value pairs as alternating arguments.
    pub fn pairs<F, V>(mut self, pairs: impl IntoIterator<Item = (F, V)>) -> Self
    where
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (field, value) in pairs {
            self.args.push(Bytes::copy_from_slice(field.as_ref()));
            self.args.push(Bytes::copy_from_slice(value.as_ref()));
        }
        self
    }

    pub fn ping() -> Self {
        Self::new("PING")
    }

    /// `HMSET key field value [field value ...]`
    pub fn hmset<F, V>(key: &str, fields: impl IntoIterator<Item = (F, V)>) -> Self
    where
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        Self::new("HMSET").arg(key).pairs(fields)
    }

    /// `HGETALL key`
    pub fn hgetall(key: &str) -> Self {
        Self::new("HGETALL").arg(key)
    }

    /// `XADD stream * field value [field value ...]`
    pub fn xadd<F, V>(stream: &str, fields: impl IntoIterator<Item = (F, V)>) -> Self
    where
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        Self::new("XADD").arg(stream).arg(STREAM_AUTO_ID).pairs(fields)
    }

    /// Upper-cased command name.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).to_ascii_uppercase()
    }

    /// Arguments after the command name.
    pub fn params(&self) -> &[Bytes] {
        &self.args[1..]
    }

    /// Name and arguments, as sent on the wire.
    pub fn parts(&self) -> &[Bytes] {
        &self.args
    }

    /// Rebuild a command from the array frame a client sent.
    ///
    /// Used by backends (and test doubles) on the receiving side.
    pub fn from_reply(frame: Reply) -> ProtocolResult<Self> {
        let items = match frame {
            Reply::Array(Some(items)) => items,
            other => {
                return Err(ProtocolError::UnexpectedReply {
                    expected: "command array",
                    got: other.type_name().into(),
                })
            }
        };
        if items.is_empty() {
            return Err(ProtocolError::Malformed("empty command".into()));
        }
        let args = items
            .into_iter()
            .map(|item| match item {
                Reply::Bulk(Some(b)) => Ok(b),
                other => Err(ProtocolError::UnexpectedReply {
                    expected: "bulk string argument",
                    got: other.type_name().into(),
                }),
            })
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self { args })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({}", self.name())?;
        if let Some(first) = self.params().first() {
            write!(f, " {}", String::from_utf8_lossy(first))?;
        }
        if self.params().len() > 1 {
            write!(f, " +{} args", self.params().len() - 1)?;
        }
        write!(f, ")")
    }
}

/// A RESP2 reply frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    pub fn ok() -> Self {
        Self::Simple("OK".into())
    }

    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        Self::Bulk(Some(Bytes::copy_from_slice(data.as_ref())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::Bulk(Some(_)) => "bulk string",
            Self::Bulk(None) => "nil",
            Self::Array(Some(_)) => "array",
            Self::Array(None) => "nil array",
        }
    }

    /// Turn an error reply into `Err`, passing every other reply through.
    pub fn into_result(self) -> ProtocolResult<Self> {
        match self {
            Self::Error(message) => Err(ProtocolError::Server(message)),
            other => Ok(other),
        }
    }

    /// Expect a simple `OK`.
    pub fn expect_ok(self) -> ProtocolResult<()> {
        match self.into_result()? {
            Self::Simple(s) if s == "OK" => Ok(()),
            other => Err(ProtocolError::UnexpectedReply {
                expected: "OK",
                got: other.type_name().into(),
            }),
        }
    }

    /// Expect a string-like reply (simple or bulk).
    pub fn into_string(self) -> ProtocolResult<String> {
        match self.into_result()? {
            Self::Simple(s) => Ok(s),
            Self::Bulk(Some(b)) => Ok(String::from_utf8_lossy(&b).into_owned()),
            other => Err(ProtocolError::UnexpectedReply {
                expected: "string",
                got: other.type_name().into(),
            }),
        }
    }

    /// Read a flat `[field, value, field, value, ...]` array as pairs.
    ///
    /// A nil array reads as no pairs.
    pub fn into_pairs(self) -> ProtocolResult<Vec<(String, String)>> {
        let items = match self.into_result()? {
            Self::Array(Some(items)) => items,
            Self::Array(None) => return Ok(Vec::new()),
            other => {
                return Err(ProtocolError::UnexpectedReply {
                    expected: "array",
                    got: other.type_name().into(),
                })
            }
        };
        if items.len() % 2 != 0 {
            return Err(ProtocolError::Malformed(format!(
                "field/value array has odd length {}",
                items.len()
            )));
        }

        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((field.into_string()?, value.into_string()?));
        }
        Ok(pairs)
    }
}
