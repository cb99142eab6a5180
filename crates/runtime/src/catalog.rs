//! Tool catalog: provider descriptors projected into model-callable specs.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// A tool exposed by the connected provider. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl TryFrom<mcp::Tool> for ToolDescriptor {
    type Error = Error;

    fn try_from(tool: mcp::Tool) -> Result<Self> {
        // A descriptor without a name is a data-integrity error, not a skip.
        if tool.name.is_empty() {
            return Err(Error::CatalogUnavailable(
                "peer returned a tool descriptor without a name".to_string(),
            ));
        }
        Ok(Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        })
    }
}

/// Ordered, name-unique set of tool descriptors for one connected provider.
///
/// Owned by a single session and rebuilt only on reconnect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from the peer's tool list, preserving its order.
    pub fn from_tools(tools: Vec<mcp::Tool>) -> Result<Self> {
        let descriptors = tools
            .into_iter()
            .map(ToolDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::from_descriptors(descriptors)
    }

    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Result<Self> {
        for (i, descriptor) in descriptors.iter().enumerate() {
            if descriptors[..i].iter().any(|d| d.name == descriptor.name) {
                return Err(Error::CatalogUnavailable(format!(
                    "duplicate tool name '{}'",
                    descriptor.name
                )));
            }
        }
        Ok(Self { tools: descriptors })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    /// Project the catalog into the schema the model endpoint expects.
    ///
    /// Pure and deterministic: one spec per descriptor, in catalog order.
    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        self.tools.iter().map(FunctionSpec::from).collect()
    }
}

/// One model-callable function, serialized as
/// `{"type":"function","function":{"name","description","parameters"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

impl FunctionSpec {
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

impl From<&ToolDescriptor> for FunctionSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            kind: "function",
            function: FunctionDef {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                parameters: descriptor.input_schema.clone(),
            },
        }
    }
}
