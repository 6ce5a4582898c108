//! Commands sent to the server.
//!
//! A command carries its identifier, its serialized arguments, the storage
//! keys extracted from those arguments and a read/write mode. Mode and key
//! layout come from the static command table in [`table`]; ids missing from
//! the table are treated as keyless writes, which the cache never stores.

mod table;
mod tracking;

pub use table::{lookup, CommandSpec};
pub use tracking::ClientTrackingOptions;

use bytes::{Bytes, BytesMut};

/// Whether a command only reads server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    Read,
    Write,
}

/// Where the storage keys sit in a command's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// No storage keys (server-level commands, CLIENT, HELLO, ...).
    None,
    /// First argument only: GET key, HGET key field.
    First,
    /// Every argument: MGET k1 k2, DEL k1 k2.
    All,
    /// Every argument but the trailing one: BLPOP k1 k2 timeout.
    AllExceptLast,
    /// Every other argument starting at the first: MSET k1 v1 k2 v2.
    Interleaved,
    /// Container command whose key follows a subcommand:
    /// XGROUP CREATE key group id, OBJECT ENCODING key.
    Subcommand { offset: usize },
    /// Argument at `index` holds the key count, keys follow it:
    /// FCALL_RO function numkeys k1 k2 arg.
    NumKeys { index: usize },
    /// Pattern matched against the keyspace (KEYS pattern). The pattern is
    /// not a storage key.
    Pattern,
}

impl KeySpec {
    fn extract(&self, arguments: &[Bytes]) -> Vec<String> {
        let key = |arg: &Bytes| String::from_utf8_lossy(arg).into_owned();

        match *self {
            KeySpec::None | KeySpec::Pattern => Vec::new(),
            KeySpec::First => arguments.first().map(key).into_iter().collect(),
            KeySpec::All => arguments.iter().map(key).collect(),
            KeySpec::AllExceptLast => arguments
                .split_last()
                .map(|(_, rest)| rest.iter().map(key).collect())
                .unwrap_or_default(),
            KeySpec::Interleaved => arguments.iter().step_by(2).map(key).collect(),
            KeySpec::Subcommand { offset } => arguments.get(offset).map(key).into_iter().collect(),
            KeySpec::NumKeys { index } => {
                let count = arguments
                    .get(index)
                    .and_then(|n| std::str::from_utf8(n).ok())
                    .and_then(|n| n.parse::<usize>().ok())
                    .unwrap_or(0);
                arguments.iter().skip(index + 1).take(count).map(key).collect()
            }
        }
    }
}

/// Conversion of argument values into wire bytes.
pub trait IntoArg {
    fn into_arg(self) -> Bytes;
}

impl IntoArg for Bytes {
    fn into_arg(self) -> Bytes {
        self
    }
}

impl IntoArg for &str {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl IntoArg for String {
    fn into_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

impl IntoArg for &String {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl IntoArg for &[u8] {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl IntoArg for Vec<u8> {
    fn into_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

macro_rules! numeric_arg {
    ($($t:ty),*) => {
        $(impl IntoArg for $t {
            fn into_arg(self) -> Bytes {
                Bytes::from(self.to_string())
            }
        })*
    };
}

numeric_arg!(i32, i64, u32, u64, usize, f64);

/// Routing hint for keyless helper commands that must reach the same node
/// as another command (CLIENT CACHING YES before a cached read).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    keys: Vec<String>,
    mode: CommandMode,
}

/// A command ready to be written to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    id: String,
    arguments: Vec<Bytes>,
    keys: Vec<String>,
    mode: CommandMode,
    key_spec: KeySpec,
    route: Option<Route>,
}

impl Command {
    /// Create a command, taking mode and key layout from the command table.
    pub fn new(id: &str) -> Self {
        let id = id.to_ascii_uppercase();
        let spec = lookup(&id);
        Self::with_spec(&id, spec.mode, spec.keys)
    }

    /// Create a command with an explicit mode and key layout.
    pub fn with_spec(id: &str, mode: CommandMode, key_spec: KeySpec) -> Self {
        Command {
            id: id.to_ascii_uppercase(),
            arguments: Vec::new(),
            keys: Vec::new(),
            mode,
            key_spec,
            route: None,
        }
    }

    /// Keyless write-mode command with the given arguments, e.g.
    /// `Command::raw("CLIENT", ["TRACKING", "ON"])`.
    pub fn raw<I, A>(id: &str, arguments: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: IntoArg,
    {
        let mut command = Self::with_spec(id, CommandMode::Write, KeySpec::None);
        command.arguments = arguments.into_iter().map(IntoArg::into_arg).collect();
        command
    }

    /// Append an argument.
    pub fn arg<A: IntoArg>(mut self, arg: A) -> Self {
        self.arguments.push(arg.into_arg());
        self.keys = self.key_spec.extract(&self.arguments);
        self
    }

    /// Append several arguments.
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: IntoArg,
    {
        self.arguments.extend(args.into_iter().map(IntoArg::into_arg));
        self.keys = self.key_spec.extract(&self.arguments);
        self
    }

    /// Replace all arguments, re-extracting keys.
    pub fn set_arguments<I, A>(&mut self, args: I)
    where
        I: IntoIterator<Item = A>,
        A: IntoArg,
    {
        self.arguments = args.into_iter().map(IntoArg::into_arg).collect();
        self.keys = self.key_spec.extract(&self.arguments);
    }

    /// Route this command to wherever `other` would be routed.
    pub fn routed_like(mut self, other: &Command) -> Self {
        self.route = Some(Route {
            keys: other.routing_keys().to_vec(),
            mode: other.routing_mode(),
        });
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arguments(&self) -> &[Bytes] {
        &self.arguments
    }

    /// Storage keys referenced by the command.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn mode(&self) -> CommandMode {
        self.mode
    }

    pub fn is_read(&self) -> bool {
        self.mode == CommandMode::Read
    }

    /// Keys used to pick a node: the routing hint if set, else own keys.
    pub fn routing_keys(&self) -> &[String] {
        self.route.as_ref().map_or(&self.keys, |r| &r.keys)
    }

    /// Mode used to pick a node: the routing hint if set, else own mode.
    pub fn routing_mode(&self) -> CommandMode {
        self.route.as_ref().map_or(self.mode, |r| r.mode)
    }

    /// Serialize as a RESP array of bulk strings.
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(b"*");
        buf.extend_from_slice((self.arguments.len() + 1).to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        write_bulk(buf, self.id.as_bytes());
        for arg in &self.arguments {
            write_bulk(buf, arg);
        }
    }
}

fn write_bulk(buf: &mut BytesMut, data: &[u8]) {
    buf.extend_from_slice(b"$");
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}
