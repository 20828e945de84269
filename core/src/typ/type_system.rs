use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarse value types understood by inspection and the symbol catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Any,
    Null,
    Logical,
    Number,
    Text,
    List,
    Record,
    Function,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Any => "any",
            TypeKind::Null => "null",
            TypeKind::Logical => "logical",
            TypeKind::Number => "number",
            TypeKind::Text => "text",
            TypeKind::List => "list",
            TypeKind::Record => "record",
            TypeKind::Function => "function",
        };
        f.write_str(s)
    }
}

/// Question asked of an [`ExternalTypeResolver`] about an identifier the
/// document does not define itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalTypeRequest {
    /// `identifier(arguments...)`
    Invocation {
        identifier: String,
        arguments: Vec<TypeKind>,
    },
    /// A bare reference to `identifier`
    Value { identifier: String },
}

impl ExternalTypeRequest {
    pub fn identifier(&self) -> &str {
        match self {
            ExternalTypeRequest::Invocation { identifier, .. } => identifier,
            ExternalTypeRequest::Value { identifier } => identifier,
        }
    }
}

/// Host hook consulted during inspection. `None` means "no opinion".
pub type ExternalTypeResolver = Arc<dyn Fn(&ExternalTypeRequest) -> Option<TypeKind> + Send + Sync>;
