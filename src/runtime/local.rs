/// In-process node computations
///
/// Local node types are computed synchronously from the node's attributes and
/// its already-resolved input values. Computations are registered in a
/// strategy map keyed by type tag; the registry is checked against this map at
/// load time (`TypeRegistry::validate`).

use crate::runtime::error::NodeError;
use crate::workflow::{registry::NodeTypeDefinition, types::NodeInstance};
use serde_json::{json, Map, Value};
use std::{collections::HashMap, fmt};

/// A pure computation for one node type
///
/// Implementations must not block or perform I/O.
pub trait LocalComputation: Send + Sync {
    /// Attribute the result is written to on the node
    fn output_field(&self) -> &str {
        "value"
    }

    /// Compute the node's output
    fn compute(&self, node: &NodeInstance, def: &NodeTypeDefinition, inputs: &Map<String, Value>) -> Value;
}

/// Strategy map of local computations
pub struct LocalExecutor {
    computations: HashMap<String, Box<dyn LocalComputation>>,
}

impl fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.computations.keys().collect();
        types.sort();
        f.debug_struct("LocalExecutor").field("types", &types).finish()
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl LocalExecutor {
    /// Executor with no computations registered
    pub fn empty() -> Self {
        Self {
            computations: HashMap::new(),
        }
    }

    /// Executor with the built-in node types registered
    pub fn with_builtins() -> Self {
        let mut executor = Self::empty();
        executor.register("number", NumberComputation);
        executor.register("sum", SumComputation);
        executor.register("textInput", TextInputComputation);
        executor.register("textOutput", DisplayComputation { field: "value" });
        executor.register("imageDisplay", DisplayComputation { field: "imgUrl" });
        executor
    }

    /// Register (or replace) the computation for a type tag
    pub fn register(&mut self, node_type: impl Into<String>, computation: impl LocalComputation + 'static) {
        self.computations.insert(node_type.into(), Box::new(computation));
    }

    /// Whether a computation exists for a type tag
    pub fn supports(&self, node_type: &str) -> bool {
        self.computations.contains_key(node_type)
    }

    /// Compute a node and write the result into its attribute bag
    ///
    /// Types without a registered computation yield null and a warning; they
    /// never fail the run.
    pub fn evaluate(&self, node: &mut NodeInstance, def: &NodeTypeDefinition, inputs: &Map<String, Value>) -> Value {
        let Some(computation) = self.computations.get(&node.node_type) else {
            tracing::warn!("⚠️ {} (node '{}')", NodeError::LocalEvaluatorGap(node.node_type.clone()), node.id);
            return Value::Null;
        };

        let result = computation.compute(node, def, inputs);
        tracing::debug!("🧮 Local node '{}' ({}) -> {}", node.id, node.node_type, result);

        let field = computation.output_field().to_string();
        if result.is_null() {
            node.data.remove(&field);
        } else {
            node.data.insert(field, result.clone());
        }
        result
    }
}

/// Emits its own `value` parameter
struct NumberComputation;

impl LocalComputation for NumberComputation {
    fn compute(&self, node: &NodeInstance, def: &NodeTypeDefinition, _inputs: &Map<String, Value>) -> Value {
        def.param(&node.data, "value").cloned().unwrap_or_else(|| json!(0))
    }
}

/// Adds every numeric input
///
/// Integer inputs produce an integer sum; any float input, or a total beyond
/// the i64 range, makes the sum a float.
struct SumComputation;

impl LocalComputation for SumComputation {
    fn compute(&self, node: &NodeInstance, _def: &NodeTypeDefinition, inputs: &Map<String, Value>) -> Value {
        let numbers: Vec<&Value> = inputs.values().filter(|v| v.is_number()).collect();

        if numbers.is_empty() {
            return node.value().filter(|v| v.is_number()).cloned().unwrap_or_else(|| json!(0));
        }

        let exact = numbers
            .iter()
            .try_fold(0i64, |acc, v| v.as_i64().and_then(|n| acc.checked_add(n)));

        match exact {
            Some(total) => json!(total),
            // Floats, u64 values beyond i64, or an overflowing total
            None => json!(numbers.iter().filter_map(|v| v.as_f64()).sum::<f64>()),
        }
    }
}

/// Emits its `text` parameter
struct TextInputComputation;

impl LocalComputation for TextInputComputation {
    fn compute(&self, node: &NodeInstance, def: &NodeTypeDefinition, _inputs: &Map<String, Value>) -> Value {
        def.param(&node.data, "text").cloned().unwrap_or_else(|| json!(""))
    }
}

/// Shows its incoming value under a display field
struct DisplayComputation {
    field: &'static str,
}

impl LocalComputation for DisplayComputation {
    fn output_field(&self) -> &str {
        self.field
    }

    fn compute(&self, _node: &NodeInstance, _def: &NodeTypeDefinition, inputs: &Map<String, Value>) -> Value {
        inputs
            .get("value")
            .or_else(|| inputs.values().next())
            .cloned()
            .unwrap_or(Value::Null)
    }
}
