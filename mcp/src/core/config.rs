//! Gateway configuration types.
//!
//! These structures describe an already-loaded, environment-expanded
//! configuration. Loading and expansion live in the binary crate; the core
//! trusts whatever value it is handed.

use std::{collections::HashMap, fmt, time::Duration};

pub use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

pub const DEFAULT_PROXY_NAME: &str = "mcp-proxy-gateway";
pub const DEFAULT_PROXY_VERSION: &str = "1.0.0";
pub const DEFAULT_SEPARATOR: &str = "__";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Identity and naming policy of the gateway itself
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Upstream servers in declaration order
    #[serde(
        deserialize_with = "deserialize_upstreams",
        serialize_with = "serialize_upstreams"
    )]
    pub upstreams: Vec<UpstreamConfig>,

    /// Variables made available to `${VAR}` expansion before the rest of the
    /// document is expanded
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_name")]
    pub name: String,

    #[serde(default = "default_proxy_version")]
    pub version: String,

    #[serde(default)]
    pub namespacing: NamespacingConfig,

    /// Upper bound for establishing one upstream connection (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamespacingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    /// Taken from the key of the `upstreams` map
    #[serde(skip)]
    pub name: String,

    #[serde(flatten)]
    pub transport: UpstreamTransport,

    /// Original tool names to expose. Absent or empty exposes everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    /// Replacement descriptions keyed by original tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_description_overrides: Option<HashMap<String, String>>,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UpstreamTransport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
    },
    Http {
        url: String,
        /// Bearer token for the Authorization header
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl fmt::Debug for UpstreamTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamTransport::Stdio { command, args, env } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("env", &format!("{} vars", env.len()))
                .finish(),
            UpstreamTransport::Http { url, token } => f
                .debug_struct("Http")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "****"))
                .finish(),
        }
    }
}

impl UpstreamTransport {
    /// Discriminator as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamTransport::Stdio { .. } => "stdio",
            UpstreamTransport::Http { .. } => "http",
        }
    }
}

impl UpstreamConfig {
    pub fn new(name: impl Into<String>, transport: UpstreamTransport) -> Self {
        Self {
            name: name.into(),
            transport,
            allowed_tools: None,
            tool_description_overrides: None,
        }
    }

    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(
            name,
            UpstreamTransport::Stdio {
                command: command.into(),
                args: Vec::new(),
                env: HashMap::new(),
            },
        )
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            name,
            UpstreamTransport::Http {
                url: url.into(),
                token: None,
            },
        )
    }

    #[must_use]
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_description_override(
        mut self,
        tool: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.tool_description_overrides
            .get_or_insert_with(HashMap::new)
            .insert(tool.into(), description.into());
        self
    }

    /// Exact, case-sensitive allow-list check. No list means no restriction.
    pub fn allows_tool(&self, original_name: &str) -> bool {
        match &self.allowed_tools {
            Some(allowed) if !allowed.is_empty() => allowed.iter().any(|t| t == original_name),
            _ => true,
        }
    }

    pub fn description_override(&self, original_name: &str) -> Option<&str> {
        self.tool_description_overrides
            .as_ref()
            .and_then(|overrides| overrides.get(original_name))
            .map(String::as_str)
    }
}

impl GatewayConfig {
    pub fn upstream(&self, name: &str) -> Option<&UpstreamConfig> {
        self.upstreams.iter().find(|u| u.name == name)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy.connect_timeout_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            name: default_proxy_name(),
            version: default_proxy_version(),
            namespacing: NamespacingConfig::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for NamespacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            separator: default_separator(),
        }
    }
}

// Default value functions
fn default_proxy_name() -> String {
    DEFAULT_PROXY_NAME.to_string()
}

fn default_proxy_version() -> String {
    DEFAULT_PROXY_VERSION.to_string()
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

/// `upstreams` is a map in the file but order matters for collision
/// resolution, so it is read into a `Vec` in declaration order.
fn deserialize_upstreams<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<UpstreamConfig>, D::Error> {
    struct UpstreamsVisitor;

    impl<'de> Visitor<'de> for UpstreamsVisitor {
        type Value = Vec<UpstreamConfig>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of upstream name to upstream settings")
        }

        fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
            let mut upstreams: Vec<UpstreamConfig> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, mut upstream)) = map.next_entry::<String, UpstreamConfig>()? {
                if upstreams.iter().any(|u| u.name == name) {
                    return Err(de::Error::custom(format!("duplicate upstream '{}'", name)));
                }
                upstream.name = name;
                upstreams.push(upstream);
            }
            Ok(upstreams)
        }
    }

    deserializer.deserialize_map(UpstreamsVisitor)
}

fn serialize_upstreams<S: Serializer>(
    upstreams: &[UpstreamConfig],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(upstreams.len()))?;
    for upstream in upstreams {
        map.serialize_entry(&upstream.name, upstream)?;
    }
    map.end()
}
