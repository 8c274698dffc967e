use anyhow::{Context, Result, anyhow};
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decision_trees::{DecisionTreeOptions, SplitFamily};
use crate::random_forests::{ExecutionMode, RandomForestOptions};

/// Options of the learning commands, read from JSON and `--param` overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LearningConfig {
    #[schemars(title = "Tree Options")]
    pub tree: DecisionTreeOptions,

    #[schemars(title = "Forest Options")]
    pub forest: RandomForestOptions,

    #[schemars(title = "Split Family")]
    pub split_family: SplitFamily,

    #[schemars(title = "Execution Mode")]
    pub execution_mode: ExecutionMode,

    #[schemars(
        title = "Seed",
        description = "Seed of the random generator, drawn at random when absent"
    )]
    pub seed: Option<u64>,
}

impl LearningConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        let config: LearningConfig =
            serde_json::from_value(value).context("invalid learning options")?;
        config.tree.validate()?;
        config.forest.validate()?;
        Ok(config)
    }
}

pub fn config_schema() -> Schema {
    schema_for!(LearningConfig)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
}

/// One leaf option of [`LearningConfig`], addressed by its dotted path.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: OptionKind,
    pub default: Option<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allowed: Option<Vec<String>>,
}

/// Flattens the schema of [`LearningConfig`] into its leaf options.
pub fn option_specs() -> Result<Vec<OptionSpec>> {
    let schema = config_schema();
    let root = schema.as_object().context("root schema is not an object")?;
    let mut out = Vec::new();
    collect_options(root, root, "", &mut out)?;
    Ok(out)
}

fn collect_options(
    root: &Map<String, Value>,
    obj: &Map<String, Value>,
    prefix: &str,
    out: &mut Vec<OptionSpec>,
) -> Result<()> {
    let Some(props) = obj.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, field) in props {
        let path = format!("{prefix}{name}");
        let field = field
            .as_object()
            .with_context(|| format!("schema of '{path}' is not an object"))?;
        let resolved = resolve_ref_obj(root, field)
            .ok_or_else(|| anyhow!("failed to resolve $ref of '{path}'"))?;

        if resolved.contains_key("properties") {
            collect_options(root, resolved, &format!("{path}."), out)?;
            continue;
        }

        let lookup = |key: &str| field.get(key).or_else(|| resolved.get(key));
        let allowed = allowed_values(resolved);
        let kind = match detect_option_kind(resolved.get("type")) {
            Some(kind) => kind,
            None if allowed.is_some() => OptionKind::String,
            None => continue,
        };

        out.push(OptionSpec {
            title: lookup("title")
                .and_then(Value::as_str)
                .unwrap_or(name)
                .to_string(),
            description: lookup("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            kind,
            default: lookup("default").cloned(),
            min: resolved.get("minimum").and_then(Value::as_f64),
            max: resolved.get("maximum").and_then(Value::as_f64),
            allowed,
            path,
        });
    }
    Ok(())
}

/// Resolves a local `$ref` like `#/$defs/SplitFamily` against the root object.
fn resolve_ref_obj<'a>(
    root: &'a Map<String, Value>,
    obj: &'a Map<String, Value>,
) -> Option<&'a Map<String, Value>> {
    match obj.get("$ref") {
        Some(Value::String(r)) => {
            let path = r.strip_prefix("#/")?;
            let mut cur = root;
            for raw_seg in path.split('/') {
                // JSON Pointer unescape (~1 => /, ~0 => ~)
                let seg = raw_seg.replace("~1", "/").replace("~0", "~");
                cur = cur.get(&seg)?.as_object()?;
            }
            Some(cur)
        }
        _ => Some(obj),
    }
}

/// Values of a string enum, written either as `enum` or as `oneOf` constants.
fn allowed_values(obj: &Map<String, Value>) -> Option<Vec<String>> {
    if let Some(values) = obj.get("enum").and_then(Value::as_array) {
        return Some(values.iter().filter_map(Value::as_str).map(str::to_string).collect());
    }
    let branches = obj.get("oneOf").and_then(Value::as_array)?;
    let values: Vec<String> = branches
        .iter()
        .filter_map(|b| {
            let b = b.as_object()?;
            match b.get("const") {
                Some(Value::String(s)) => Some(vec![s.clone()]),
                _ => Some(
                    b.get("enum")?
                        .as_array()?
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                ),
            }
        })
        .flatten()
        .collect();
    (!values.is_empty()).then_some(values)
}

fn detect_option_kind(ty: Option<&Value>) -> Option<OptionKind> {
    let kind = |s: &str| match s {
        "string" => Some(OptionKind::String),
        "integer" => Some(OptionKind::Integer),
        "number" => Some(OptionKind::Number),
        "boolean" => Some(OptionKind::Boolean),
        _ => None,
    };
    match ty {
        Some(Value::String(s)) => kind(s),
        // unions like ["integer", "null"] for Option<T>
        Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).find_map(kind),
        _ => None,
    }
}
