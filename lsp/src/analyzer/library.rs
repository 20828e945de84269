//! Symbol catalog of library constants and functions, and the provider that
//! answers completion, hover and signature help from it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use qls_core::typ::{ExternalTypeRequest, ExternalTypeResolver, TypeKind};
use serde::Deserialize;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, Hover, ParameterInformation, ParameterLabel,
    SignatureHelp, SignatureInformation,
};

use super::provider::{text_hover, CompletionContext, HoverContext, SignatureHelpContext, SymbolProvider};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub optional: bool,
}

impl Parameter {
    pub fn required(name: impl Into<String>, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            optional: false,
        }
    }

    fn describe(&self) -> String {
        let mut out = String::new();
        if self.optional {
            out.push_str("optional ");
        }
        out.push_str(&self.name);
        out.push_str(": ");
        if self.nullable {
            out.push_str("nullable ");
        }
        out.push_str(&self.ty.to_string());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DefinitionKind {
    Constant {
        #[serde(rename = "type")]
        ty: TypeKind,
    },
    Function {
        #[serde(default)]
        parameters: Vec<Parameter>,
        #[serde(rename = "returnType", default)]
        return_type: TypeKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibraryDefinition {
    pub name: String,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(flatten)]
    pub kind: DefinitionKind,
}

impl LibraryDefinition {
    pub fn constant(name: impl Into<String>, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            documentation: None,
            kind: DefinitionKind::Constant { ty },
        }
    }

    pub fn function(name: impl Into<String>, parameters: Vec<Parameter>, return_type: TypeKind) -> Self {
        Self {
            name: name.into(),
            documentation: None,
            kind: DefinitionKind::Function {
                parameters,
                return_type,
            },
        }
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn hover_text(&self) -> String {
        match &self.kind {
            DefinitionKind::Constant { ty } => format!("[library constant] {}: {}", self.name, ty),
            DefinitionKind::Function {
                parameters,
                return_type,
            } => format!(
                "[library function] {}: ({}) => {}",
                self.name,
                join_parameters(parameters),
                return_type
            ),
        }
    }

    /// `None` for constants.
    pub fn signature_label(&self) -> Option<String> {
        match &self.kind {
            DefinitionKind::Constant { .. } => None,
            DefinitionKind::Function { parameters, .. } => {
                Some(format!("{}({})", self.name, join_parameters(parameters)))
            }
        }
    }
}

fn join_parameters(parameters: &[Parameter]) -> String {
    parameters.iter().map(Parameter::describe).collect::<Vec<_>>().join(", ")
}

/// Definitions in insertion order plus a name index.
#[derive(Debug, Clone, Default)]
pub struct Library {
    definitions: Vec<LibraryDefinition>,
    index: HashMap<String, usize>,
}

impl Library {
    /// A later definition with an already-seen name replaces the earlier one
    /// in place.
    pub fn new(definitions: impl IntoIterator<Item = LibraryDefinition>) -> Self {
        let mut library = Self::default();
        for definition in definitions {
            match library.index.get(&definition.name) {
                Some(&idx) => library.definitions[idx] = definition,
                None => {
                    library.index.insert(definition.name.clone(), library.definitions.len());
                    library.definitions.push(definition);
                }
            }
        }
        library
    }

    /// Parse a JSON array of definitions.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let definitions: Vec<LibraryDefinition> =
            serde_json::from_str(json).context("invalid library definition file")?;
        Ok(Self::new(definitions))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read library file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, name: &str) -> Option<&LibraryDefinition> {
        self.index.get(name).map(|&idx| &self.definitions[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolver answering inspection's questions about catalog identifiers.
    pub fn type_resolver(self: &Arc<Self>) -> ExternalTypeResolver {
        let library = Arc::clone(self);
        Arc::new(move |request: &ExternalTypeRequest| {
            let definition = library.get(request.identifier())?;
            match (request, &definition.kind) {
                (ExternalTypeRequest::Value { .. }, DefinitionKind::Constant { ty }) => Some(*ty),
                (ExternalTypeRequest::Value { .. }, DefinitionKind::Function { .. }) => Some(TypeKind::Function),
                (ExternalTypeRequest::Invocation { .. }, DefinitionKind::Function { return_type, .. }) => {
                    Some(*return_type)
                }
                (ExternalTypeRequest::Invocation { .. }, DefinitionKind::Constant { .. }) => None,
            }
        })
    }
}

pub struct LibraryProvider {
    library: Arc<Library>,
}

impl LibraryProvider {
    pub fn new(library: Arc<Library>) -> Self {
        Self { library }
    }
}

fn completion_item(definition: &LibraryDefinition) -> CompletionItem {
    let kind = match definition.kind {
        DefinitionKind::Constant { .. } => CompletionItemKind::CONSTANT,
        DefinitionKind::Function { .. } => CompletionItemKind::FUNCTION,
    };
    CompletionItem {
        label: definition.name.clone(),
        kind: Some(kind),
        detail: Some(definition.hover_text()),
        documentation: definition.documentation.clone().map(Documentation::String),
        ..Default::default()
    }
}

#[async_trait]
impl SymbolProvider for LibraryProvider {
    async fn completion_items(&self, context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>> {
        let prefix = context.prefix();
        Ok(self
            .library
            .iter()
            .filter(|definition| definition.name.starts_with(prefix))
            .map(completion_item)
            .collect())
    }

    async fn hover(&self, context: &HoverContext) -> anyhow::Result<Option<Hover>> {
        Ok(self
            .library
            .get(&context.identifier)
            .map(|definition| text_hover(definition.hover_text(), context.range)))
    }

    async fn signature_help(&self, context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>> {
        let Some(definition) = self.library.get(&context.function_name) else {
            return Ok(None);
        };
        let DefinitionKind::Function { parameters, .. } = &definition.kind else {
            return Ok(None);
        };
        let Some(label) = definition.signature_label() else {
            return Ok(None);
        };

        let signature = SignatureInformation {
            label,
            documentation: definition.documentation.clone().map(Documentation::String),
            parameters: Some(
                parameters
                    .iter()
                    .map(|parameter| ParameterInformation {
                        label: ParameterLabel::Simple(parameter.describe()),
                        documentation: None,
                    })
                    .collect(),
            ),
            active_parameter: None,
        };
        let active_parameter = if parameters.is_empty() {
            None
        } else {
            Some(context.argument_ordinal)
        };

        Ok(Some(SignatureHelp {
            signatures: vec![signature],
            active_signature: Some(0),
            active_parameter,
        }))
    }
}
