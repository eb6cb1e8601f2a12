//! Tool registry: the fixed catalog of capabilities the router may call.
//!
//! Dispatch goes through the closed [`ToolKind`] enum. Arguments arrive as
//! keyword and positional JSON values and are bound against the tool's
//! parameter list before the backend runs, so backends only ever see
//! well-typed input.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use barista_storage::{ProductRepository, TextToSqlService};
use barista_vector::ProductSearch;

use crate::error::ChatError;
use crate::types::ToolOutput;

/// Default page size for `get_products`.
const DEFAULT_PAGE_SIZE: i64 = 20;
/// Largest page `get_products` will return.
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    GetSimilarProducts,
    GetProducts,
    TextToSqlQuery,
    AdditionCalculator,
    MultiplicationCalculator,
}

impl ToolKind {
    /// Registration order.
    pub const ALL: [ToolKind; 5] = [
        ToolKind::GetSimilarProducts,
        ToolKind::GetProducts,
        ToolKind::TextToSqlQuery,
        ToolKind::AdditionCalculator,
        ToolKind::MultiplicationCalculator,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::GetSimilarProducts => "get_similar_products",
            ToolKind::GetProducts => "get_products",
            ToolKind::TextToSqlQuery => "text_to_sql_query",
            ToolKind::AdditionCalculator => "addition_calculator",
            ToolKind::MultiplicationCalculator => "multiplication_calculator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn descriptor(self) -> ToolDescriptor {
        match self {
            ToolKind::GetSimilarProducts => ToolDescriptor {
                name: self.name(),
                description: "Semantic similarity search over the drinkware catalog \
                              (mugs, tumblers, cups, bottles).",
                params: vec![
                    ParamSpec::required("query", ParamKind::String, "What the customer is looking for"),
                    ParamSpec::optional("top_k", ParamKind::Integer, "Maximum number of products to return"),
                ],
                returns: "Array of {id, content, similarity_score}, most similar first",
            },
            ToolKind::GetProducts => ToolDescriptor {
                name: self.name(),
                description: "List products from the catalog.",
                params: vec![
                    ParamSpec::optional("limit", ParamKind::Integer, "Page size (default 20, max 100)"),
                    ParamSpec::optional("offset", ParamKind::Integer, "Number of products to skip"),
                ],
                returns: "{total, products: [{id, name, category, price, description}]}",
            },
            ToolKind::TextToSqlQuery => ToolDescriptor {
                name: self.name(),
                description: "Answer questions about outlet locations, names and opening \
                              hours by querying the outlet database.",
                params: vec![ParamSpec::required(
                    "query",
                    ParamKind::String,
                    "The outlet question in plain language",
                )],
                returns: "{row_count, rows} plus the generated SQL",
            },
            ToolKind::AdditionCalculator => ToolDescriptor {
                name: self.name(),
                description: "Sum a list of integers. Use for every addition.",
                params: vec![ParamSpec::required(
                    "numbers",
                    ParamKind::IntegerList,
                    "Integers to add",
                )],
                returns: "Integer sum",
            },
            ToolKind::MultiplicationCalculator => ToolDescriptor {
                name: self.name(),
                description: "Multiply two integers. Use for every multiplication.",
                params: vec![
                    ParamSpec::required("num", ParamKind::Integer, "Multiplicand"),
                    ParamSpec::required("multiplier", ParamKind::Integer, "Multiplier"),
                ],
                returns: "Integer product",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    IntegerList,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.as_i64().is_some(),
            ParamKind::IntegerList => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| v.as_i64().is_some())),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ParamKind::String => "a string",
            ParamKind::Integer => "an integer",
            ParamKind::IntegerList => "a list of integers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Name, routing description and input/output contract of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub returns: &'static str,
}

impl ToolDescriptor {
    /// Bind positional then keyword arguments to the parameter list.
    ///
    /// Explicit `null` for an optional parameter is treated as absent.
    pub fn bind(
        &self,
        kwargs: &Map<String, Value>,
        args: &[Value],
    ) -> Result<Map<String, Value>, ChatError> {
        if args.len() > self.params.len() {
            return Err(ChatError::invalid_args(
                self.name,
                format!(
                    "expected at most {} positional arguments, got {}",
                    self.params.len(),
                    args.len()
                ),
            ));
        }

        let mut bound = Map::new();
        for (param, value) in self.params.iter().zip(args) {
            bound.insert(param.name.to_string(), value.clone());
        }

        for (key, value) in kwargs {
            if !self.params.iter().any(|p| p.name == key.as_str()) {
                return Err(ChatError::invalid_args(
                    self.name,
                    format!("unknown argument `{}`", key),
                ));
            }
            if bound.contains_key(key) {
                return Err(ChatError::invalid_args(
                    self.name,
                    format!("argument `{}` given both positionally and by keyword", key),
                ));
            }
            bound.insert(key.clone(), value.clone());
        }

        for param in &self.params {
            let present = bound.get(param.name).filter(|v| !v.is_null()).cloned();
            match present {
                None if param.required => {
                    return Err(ChatError::invalid_args(
                        self.name,
                        format!("missing required argument `{}`", param.name),
                    ));
                }
                None => {
                    bound.remove(param.name);
                }
                Some(value) if !param.kind.accepts(&value) => {
                    return Err(ChatError::invalid_args(
                        self.name,
                        format!("argument `{}` must be {}", param.name, param.kind.label()),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(bound)
    }
}

/// Fixed catalog of tools and the backends they run against.
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    search: Arc<ProductSearch>,
    catalog: Arc<ProductRepository>,
    outlets: Arc<TextToSqlService>,
}

impl ToolRegistry {
    pub fn new(
        search: Arc<ProductSearch>,
        catalog: Arc<ProductRepository>,
        outlets: Arc<TextToSqlService>,
    ) -> Self {
        Self {
            descriptors: ToolKind::ALL.iter().map(|k| k.descriptor()).collect(),
            search,
            catalog,
            outlets,
        }
    }

    /// Registered tools in registration order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.descriptors.clone()
    }

    /// Validate arguments and run the named tool. No retries.
    pub async fn invoke(
        &self,
        name: &str,
        kwargs: &Map<String, Value>,
        args: &[Value],
    ) -> Result<ToolOutput, ChatError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ChatError::UnknownTool(name.to_string()))?;
        self.invoke_kind(kind, kwargs, args).await
    }

    pub async fn invoke_kind(
        &self,
        kind: ToolKind,
        kwargs: &Map<String, Value>,
        args: &[Value],
    ) -> Result<ToolOutput, ChatError> {
        let bound = kind.descriptor().bind(kwargs, args)?;
        debug!(tool = kind.name(), ?bound, "Invoking tool");

        match kind {
            ToolKind::GetSimilarProducts => self.similar_products(&bound).await,
            ToolKind::GetProducts => self.list_products(&bound).await,
            ToolKind::TextToSqlQuery => self.query_outlets(&bound).await,
            ToolKind::AdditionCalculator => add(&bound),
            ToolKind::MultiplicationCalculator => multiply(&bound),
        }
    }

    async fn similar_products(&self, bound: &Map<String, Value>) -> Result<ToolOutput, ChatError> {
        let tool = ToolKind::GetSimilarProducts.name();
        let query = string_arg(bound, "query");
        let top_k = match int_arg(bound, "top_k") {
            Some(k) if k < 1 => {
                return Err(ChatError::invalid_args(tool, "`top_k` must be at least 1"));
            }
            Some(k) => Some(k as usize),
            None => None,
        };

        let matches = self
            .search
            .similar_products(query, top_k)
            .await
            .map_err(|e| ChatError::SearchUnavailable(e.to_string()))?;

        Ok(ToolOutput::value(json!(matches)))
    }

    async fn list_products(&self, bound: &Map<String, Value>) -> Result<ToolOutput, ChatError> {
        let tool = ToolKind::GetProducts.name();
        let limit = int_arg(bound, "limit").unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = int_arg(bound, "offset").unwrap_or(0);
        if limit < 1 || offset < 0 {
            return Err(ChatError::invalid_args(
                tool,
                "`limit` must be positive and `offset` non-negative",
            ));
        }
        let limit = limit.min(MAX_PAGE_SIZE) as u32;
        let offset = u32::try_from(offset).unwrap_or(u32::MAX);

        let catalog = Arc::clone(&self.catalog);
        let (total, products) = tokio::task::spawn_blocking(move || {
            Ok::<_, ChatError>((catalog.count()?, catalog.list(limit, offset)?))
        })
        .await
        .map_err(|e| ChatError::Storage(format!("catalog task failed: {}", e)))??;

        Ok(ToolOutput::value(json!({
            "total": total,
            "products": products,
        })))
    }

    async fn query_outlets(&self, bound: &Map<String, Value>) -> Result<ToolOutput, ChatError> {
        let question = string_arg(bound, "query").to_string();
        let outlets = Arc::clone(&self.outlets);

        let answer = tokio::task::spawn_blocking(move || outlets.generate_and_run(&question))
            .await
            .map_err(|e| ChatError::Storage(format!("outlet query task failed: {}", e)))??;

        Ok(ToolOutput {
            value: json!({
                "row_count": answer.rows.len(),
                "rows": answer.rows,
            }),
            generated_sql: Some(answer.generated_sql),
        })
    }
}

fn add(bound: &Map<String, Value>) -> Result<ToolOutput, ChatError> {
    let numbers = bound
        .get("numbers")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect::<Vec<_>>())
        .unwrap_or_default();

    let sum = numbers
        .iter()
        .try_fold(0i64, |acc, n| acc.checked_add(*n))
        .ok_or_else(|| {
            ChatError::invalid_args(ToolKind::AdditionCalculator.name(), "sum overflows")
        })?;

    Ok(ToolOutput::value(json!(sum)))
}

fn multiply(bound: &Map<String, Value>) -> Result<ToolOutput, ChatError> {
    let num = int_arg(bound, "num").unwrap_or_default();
    let multiplier = int_arg(bound, "multiplier").unwrap_or_default();
    let product = num.checked_mul(multiplier).ok_or_else(|| {
        ChatError::invalid_args(ToolKind::MultiplicationCalculator.name(), "product overflows")
    })?;
    Ok(ToolOutput::value(json!(product)))
}

// Bound arguments are already type-checked.
fn string_arg<'a>(bound: &'a Map<String, Value>, name: &str) -> &'a str {
    bound.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn int_arg(bound: &Map<String, Value>, name: &str) -> Option<i64> {
    bound.get(name).and_then(Value::as_i64)
}
