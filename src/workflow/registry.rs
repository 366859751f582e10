/// Node type registry with hot-reload using ArcSwap
///
/// The registry describes every node type the canvas can place: whether it
/// runs locally or on the remote backend, its slots, its parameters with
/// defaults, and display flags. A run receives an immutable `&TypeRegistry`;
/// refreshing swaps the whole registry pointer so runs already in progress
/// keep the version they started with.

use crate::runtime::local::LocalExecutor;
use anyhow::Result;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

/// Registry format version this engine understands
pub const EXPECTED_VERSION: &str = "1.0.0";

/// Complete set of node type definitions, keyed by type tag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    /// Format version reported by the backend
    #[serde(default)]
    pub version: Option<String>,
    /// Type tag -> definition
    #[serde(default)]
    pub nodes: HashMap<String, NodeTypeDefinition>,
}

/// Static description of one node type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDefinition {
    /// Executes in-process through the local executor when true,
    /// otherwise through the remote backend
    #[serde(default)]
    pub client_only: bool,
    /// Human-readable name for menus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Declared input slot names
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Declared output slot names
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Declared parameters with defaults and widget hints
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
    /// Type emits incremental partial output over the channel
    #[serde(default)]
    pub is_streaming: bool,
    /// Edges leaving nodes of this type display the settled value
    #[serde(default = "default_true")]
    pub show_output_on_edge: bool,
}

/// Parameter declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Value used when the node's attribute bag has none
    #[serde(default)]
    pub default: Value,
    /// Widget keyword for the canvas (e.g., "number", "textarea")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<String>,
    /// Widget-specific settings (min, max, options...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl NodeTypeDefinition {
    /// Parameter defaults, as applied by a "reset" of a node
    pub fn defaults(&self) -> Map<String, Value> {
        self.params
            .iter()
            .map(|(key, spec)| (key.clone(), spec.default.clone()))
            .collect()
    }

    /// Resolve a parameter: node attribute first, then declared default
    pub fn param<'a>(&'a self, data: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        data.get(key)
            .filter(|v| !v.is_null())
            .or_else(|| self.params.get(key).map(|spec| &spec.default))
            .filter(|v| !v.is_null())
    }
}

impl TypeRegistry {
    /// Parse a registry document
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("Invalid node registry document: {}", e))
    }

    /// Empty registry in the expected format, used as a safe fallback
    pub fn empty() -> Self {
        Self {
            version: Some(EXPECTED_VERSION.to_string()),
            nodes: HashMap::new(),
        }
    }

    /// Registry describing the built-in local computations
    pub fn builtin() -> Self {
        let doc = json!({
            "version": EXPECTED_VERSION,
            "nodes": {
                "number": {
                    "clientOnly": true,
                    "displayName": "Number",
                    "outputs": ["value"],
                    "params": { "value": { "default": 0, "ui": "number" } }
                },
                "sum": {
                    "clientOnly": true,
                    "displayName": "Sum",
                    "inputs": ["x", "y"],
                    "outputs": ["value"]
                },
                "textInput": {
                    "clientOnly": true,
                    "displayName": "Text Input",
                    "outputs": ["value"],
                    "params": { "text": { "default": "", "ui": "textarea" } }
                },
                "textOutput": {
                    "clientOnly": true,
                    "displayName": "Result",
                    "inputs": ["value"],
                    "showOutputOnEdge": false
                },
                "imageDisplay": {
                    "clientOnly": true,
                    "displayName": "Image Display",
                    "inputs": ["value"],
                    "showOutputOnEdge": false
                }
            }
        });
        // The document above is static and always matches the schema
        serde_json::from_value(doc).unwrap_or_else(|_| Self::empty())
    }

    /// Fetch the registry from the backend's `/node-registry` endpoint
    pub async fn fetch(url: &str) -> Result<Self> {
        tracing::debug!("🌐 Fetching node registry from {}", url);
        let response = reqwest::get(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach node registry at {}: {}", url, e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Non-200 response from node registry: {}", response.status()));
        }

        let registry: TypeRegistry = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to decode node registry: {}", e))?;

        if registry.version.as_deref().is_some_and(|v| v != EXPECTED_VERSION) {
            tracing::warn!("⚠️ Node registry version {:?} differs from expected {}", registry.version, EXPECTED_VERSION);
        }

        tracing::info!("📚 Loaded node registry with {} types", registry.nodes.len());
        Ok(registry)
    }

    /// Fetch the registry, falling back to an empty one on any failure
    pub async fn load_or_empty(url: &str) -> Self {
        match Self::fetch(url).await {
            Ok(registry) => registry,
            Err(e) => {
                tracing::error!("❌ Failed to load node registry: {}", e);
                Self::empty()
            }
        }
    }

    /// Look up a type definition
    pub fn get(&self, node_type: &str) -> Option<&NodeTypeDefinition> {
        self.nodes.get(node_type)
    }

    /// Merge another registry's definitions over this one
    pub fn merged_with(mut self, other: TypeRegistry) -> Self {
        self.nodes.extend(other.nodes);
        if other.version.is_some() {
            self.version = other.version;
        }
        self
    }

    /// Check dispatch targets at load time
    ///
    /// Returns the client-only types that have no local computation. Running
    /// such a node yields null, so the problem is surfaced here once instead
    /// of being discovered node by node.
    pub fn validate(&self, local: &LocalExecutor) -> Vec<String> {
        let mut missing: Vec<String> = self
            .nodes
            .iter()
            .filter(|(node_type, def)| def.client_only && !local.supports(node_type))
            .map(|(node_type, _)| node_type.clone())
            .collect();
        missing.sort();
        missing
    }
}

/// Lock-free, hot-swappable handle to the current registry
#[derive(Debug)]
pub struct RegistryHandle {
    /// Atomic pointer to the active registry
    current: ArcSwap<TypeRegistry>,
    /// Backend endpoint used by `refresh`
    source_url: Option<String>,
}

impl RegistryHandle {
    /// Create a handle around an initial registry
    pub fn new(registry: TypeRegistry, source_url: Option<String>) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(registry)),
            source_url,
        }
    }

    /// Snapshot of the active registry for one run
    pub fn current(&self) -> Arc<TypeRegistry> {
        self.current.load_full()
    }

    /// Atomically replace the active registry
    pub fn replace(&self, registry: TypeRegistry) {
        self.current.store(Arc::new(registry));
    }

    /// Re-fetch from the backend and swap in the result
    ///
    /// Remote definitions are layered over the built-in ones so local types
    /// stay available even when the backend does not advertise them.
    pub async fn refresh(&self, local: &LocalExecutor) -> Result<Arc<TypeRegistry>> {
        let url = self
            .source_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No registry URL configured"))?;

        let fresh = TypeRegistry::builtin().merged_with(TypeRegistry::fetch(url).await?);
        for node_type in fresh.validate(local) {
            tracing::warn!("⚠️ Client-only type '{}' has no local computation", node_type);
        }

        self.replace(fresh);
        tracing::info!("🔥 Hot-reloaded node registry from {}", url);
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_document() {
        let registry = TypeRegistry::from_json(json!({
            "nodes": {
                "llm": {
                    "clientOnly": false,
                    "inputs": ["prompt"],
                    "outputs": ["response", "tokens"],
                    "params": { "model": { "default": "gpt-4o", "ui": "select", "options": ["a"] } },
                    "isStreaming": true
                }
            }
        }))
        .unwrap();

        let llm = registry.get("llm").unwrap();
        assert!(!llm.client_only);
        assert!(llm.is_streaming);
        assert!(llm.show_output_on_edge);
        assert_eq!(llm.params["model"].extra.get("options"), Some(&json!(["a"])));
        assert_eq!(llm.defaults().get("model"), Some(&json!("gpt-4o")));
    }

    #[test]
    fn param_prefers_node_attribute() {
        let registry = TypeRegistry::builtin();
        let number = registry.get("number").unwrap();

        let mut data = Map::new();
        assert_eq!(number.param(&data, "value"), Some(&json!(0)));

        data.insert("value".into(), json!(7));
        assert_eq!(number.param(&data, "value"), Some(&json!(7)));
        assert_eq!(number.param(&data, "missing"), None);
    }

    #[test]
    fn builtin_registry_is_fully_dispatchable() {
        let registry = TypeRegistry::builtin();
        assert_eq!(registry.nodes.len(), 5);
        assert!(registry.validate(&LocalExecutor::with_builtins()).is_empty());
        assert!(!registry.get("textOutput").unwrap().show_output_on_edge);
    }

    #[test]
    fn validate_reports_missing_local_computations() {
        let registry = TypeRegistry::builtin().merged_with(
            TypeRegistry::from_json(json!({
                "nodes": {
                    "slider": { "clientOnly": true },
                    "llm": { "clientOnly": false }
                }
            }))
            .unwrap(),
        );
        assert_eq!(registry.validate(&LocalExecutor::with_builtins()), vec!["slider".to_string()]);
    }

    #[test]
    fn handle_swaps_registry() {
        let handle = RegistryHandle::new(TypeRegistry::empty(), None);
        let before = handle.current();
        handle.replace(TypeRegistry::builtin());
        assert!(before.nodes.is_empty());
        assert_eq!(handle.current().nodes.len(), 5);
    }
}
