// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`ArgumentBinding`]: where one declared [`capns_catalog::Arg`]'s value
//! comes from in a built [`crate::Plan`], and [`resolve_binding`], the pure
//! function that turns a binding plus runtime context into raw bytes.

use std::collections::HashMap;
use std::path::PathBuf;

use capns_urn::CapUrn;
use serde::{Deserialize, Serialize};

use crate::PlannerError;

/// Where a plan step's argument value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentBinding {
    /// The Nth caller-supplied input file (0-indexed).
    InputFileAtIndex(u32),
    /// The caller-supplied input file's path as a string, not its bytes.
    InputFilePath,
    /// The caller-supplied input file's declared media URN.
    InputMediaUrn,
    /// A previous step's output, optionally narrowed to one field of a
    /// structured output.
    PreviousOutput {
        /// The producing step's node id.
        node_id: String,
        /// Optional field path into a structured (record) output.
        #[serde(default)]
        field: Option<String>,
    },
    /// The cap's declared default for this argument.
    CapDefault,
    /// A named per-cap setting supplied out of band (e.g. plugin config).
    CapSetting(String),
    /// A literal string value.
    LiteralString(String),
    /// A literal numeric value.
    LiteralNumber(f64),
    /// A literal boolean value.
    LiteralBool(bool),
    /// A literal arbitrary JSON value.
    LiteralJson(serde_json::Value),
    /// Unresolved — must be filled in by the caller before execution.
    Slot {
        /// The slot's name, shown to the caller.
        name: String,
        /// Optional JSON schema describing the expected value shape.
        #[serde(default)]
        schema: Option<serde_json::Value>,
    },
    /// A value drawn from the plan's own metadata table.
    PlanMetadata(String),
}

/// Runtime context [`resolve_binding`] draws concrete values from.
#[derive(Debug, Clone, Default)]
pub struct ArgumentResolutionContext {
    /// Caller-supplied input files, in order.
    pub input_files: Vec<PathBuf>,
    /// Index into `input_files` identifying "the current" input, used by
    /// bindings that don't specify an explicit index.
    pub current_file_index: usize,
    /// Prior steps' outputs, keyed by node id.
    pub previous_outputs: HashMap<String, serde_json::Value>,
    /// Plan-level metadata, set at build time or by the caller.
    pub plan_metadata: HashMap<String, serde_json::Value>,
    /// Per-cap settings, keyed by the cap's canonical URN text.
    pub cap_settings: HashMap<String, serde_json::Value>,
    /// Caller-supplied values for [`ArgumentBinding::Slot`]s, keyed by slot
    /// name.
    pub slot_values: HashMap<String, serde_json::Value>,
}

/// Where [`resolve_binding`] actually pulled a value from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSource {
    /// An input file (path or contents).
    InputFile,
    /// A previous step's output.
    PreviousOutput,
    /// The cap's own declared default.
    CapDefault,
    /// A per-cap setting.
    CapSetting,
    /// A literal value embedded in the plan.
    Literal,
    /// A caller-supplied slot value.
    Slot,
    /// Plan-level metadata.
    PlanMetadata,
}

/// A binding resolved to raw bytes, tagged with where the value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArgument {
    /// The resolved value, serialized to bytes (UTF-8 text for strings and
    /// JSON values, raw file contents for file-backed bindings).
    pub bytes: Vec<u8>,
    /// Where the value was drawn from.
    pub source: ResolvedSource,
}

/// Resolve `binding` to raw bytes using `context`, `cap_urn`'s settings (if
/// any), `default_value` (the arg's declared default), and whether the
/// argument `is_required`.
///
/// # Errors
///
/// [`PlannerError::NotFound`] if the binding names an input file index,
/// previous-output node id, setting, or slot that `context` doesn't have.
/// [`PlannerError::InvalidInput`] if an unresolved required argument has no
/// default and resolves to [`ArgumentBinding::Slot`] with no caller-supplied
/// value.
pub fn resolve_binding(
    binding: &ArgumentBinding,
    context: &ArgumentResolutionContext,
    cap_urn: &CapUrn,
    default_value: Option<&serde_json::Value>,
    is_required: bool,
) -> Result<ResolvedArgument, PlannerError> {
    match binding {
        ArgumentBinding::InputFileAtIndex(index) => {
            let path = context.input_files.get(*index as usize).ok_or_else(|| {
                PlannerError::NotFound(format!("no input file at index {index}"))
            })?;
            Ok(ResolvedArgument {
                bytes: read_file(path)?,
                source: ResolvedSource::InputFile,
            })
        }
        ArgumentBinding::InputFilePath => {
            let path = context
                .input_files
                .get(context.current_file_index)
                .ok_or_else(|| PlannerError::NotFound("no current input file".to_owned()))?;
            Ok(ResolvedArgument {
                bytes: path.to_string_lossy().into_owned().into_bytes(),
                source: ResolvedSource::InputFile,
            })
        }
        ArgumentBinding::InputMediaUrn => {
            // The declared media URN of the current input is carried by the
            // plan step's own arg declaration, not the runtime context; this
            // binding resolves to the cap URN's `in` field as a fallback
            // textual representation.
            Ok(ResolvedArgument {
                bytes: cap_urn.in_field().to_string().into_bytes(),
                source: ResolvedSource::InputFile,
            })
        }
        ArgumentBinding::PreviousOutput { node_id, field } => {
            let output = context.previous_outputs.get(node_id).ok_or_else(|| {
                PlannerError::NotFound(format!("no recorded output for step `{node_id}`"))
            })?;
            let value = match field {
                Some(path) => output
                    .get(path)
                    .ok_or_else(|| PlannerError::NotFound(format!("output field `{path}` not present")))?,
                None => output,
            };
            Ok(ResolvedArgument {
                bytes: json_to_bytes(value),
                source: ResolvedSource::PreviousOutput,
            })
        }
        ArgumentBinding::CapDefault => resolve_default(default_value, is_required),
        ArgumentBinding::CapSetting(key) => {
            let settings_key = format!("{cap_urn}#{key}");
            context
                .cap_settings
                .get(&settings_key)
                .or_else(|| context.cap_settings.get(key))
                .map(|value| ResolvedArgument {
                    bytes: json_to_bytes(value),
                    source: ResolvedSource::CapSetting,
                })
                .ok_or_else(|| PlannerError::NotFound(format!("no cap setting `{key}`")))
        }
        ArgumentBinding::LiteralString(s) => Ok(ResolvedArgument {
            bytes: s.clone().into_bytes(),
            source: ResolvedSource::Literal,
        }),
        ArgumentBinding::LiteralNumber(n) => Ok(ResolvedArgument {
            bytes: n.to_string().into_bytes(),
            source: ResolvedSource::Literal,
        }),
        ArgumentBinding::LiteralBool(b) => Ok(ResolvedArgument {
            bytes: b.to_string().into_bytes(),
            source: ResolvedSource::Literal,
        }),
        ArgumentBinding::LiteralJson(value) => Ok(ResolvedArgument {
            bytes: json_to_bytes(value),
            source: ResolvedSource::Literal,
        }),
        ArgumentBinding::Slot { name, .. } => context
            .slot_values
            .get(name)
            .map(|value| ResolvedArgument {
                bytes: json_to_bytes(value),
                source: ResolvedSource::Slot,
            })
            .ok_or_else(|| PlannerError::InvalidInput(format!("slot `{name}` was never filled"))),
        ArgumentBinding::PlanMetadata(key) => context
            .plan_metadata
            .get(key)
            .map(|value| ResolvedArgument {
                bytes: json_to_bytes(value),
                source: ResolvedSource::PlanMetadata,
            })
            .ok_or_else(|| PlannerError::NotFound(format!("no plan metadata `{key}`"))),
    }
}

fn resolve_default(
    default_value: Option<&serde_json::Value>,
    is_required: bool,
) -> Result<ResolvedArgument, PlannerError> {
    match default_value {
        Some(value) => Ok(ResolvedArgument {
            bytes: json_to_bytes(value),
            source: ResolvedSource::CapDefault,
        }),
        None if is_required => Err(PlannerError::InvalidInput(
            "required argument has no default and no binding".to_owned(),
        )),
        None => Ok(ResolvedArgument {
            bytes: Vec::new(),
            source: ResolvedSource::CapDefault,
        }),
    }
}

fn json_to_bytes(value: &serde_json::Value) -> Vec<u8> {
    match value {
        serde_json::Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

fn read_file(path: &std::path::Path) -> Result<Vec<u8>, PlannerError> {
    std::fs::read(path)
        .map_err(|err| PlannerError::Internal(format!("reading `{}`: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ArgumentResolutionContext {
        ArgumentResolutionContext::default()
    }

    #[test]
    fn literal_string_roundtrips() {
        let cap_urn = CapUrn::parse("cap:in=media:pdf;out=media:png").unwrap();
        let resolved = resolve_binding(
            &ArgumentBinding::LiteralString("hello".into()),
            &ctx(),
            &cap_urn,
            None,
            true,
        )
        .unwrap();
        assert_eq!(resolved.bytes, b"hello");
        assert_eq!(resolved.source, ResolvedSource::Literal);
    }

    #[test]
    fn previous_output_field_lookup() {
        let cap_urn = CapUrn::parse("cap:in=media:pdf;out=media:png").unwrap();
        let mut context = ctx();
        context.previous_outputs.insert(
            "step-0".into(),
            serde_json::json!({"path": "/tmp/out.png"}),
        );
        let binding = ArgumentBinding::PreviousOutput {
            node_id: "step-0".into(),
            field: Some("path".into()),
        };
        let resolved = resolve_binding(&binding, &context, &cap_urn, None, true).unwrap();
        assert_eq!(resolved.bytes, b"/tmp/out.png");
    }

    #[test]
    fn unresolved_required_slot_is_invalid_input() {
        let cap_urn = CapUrn::parse("cap:in=media:pdf;out=media:png").unwrap();
        let binding = ArgumentBinding::Slot {
            name: "quality".into(),
            schema: None,
        };
        let err = resolve_binding(&binding, &ctx(), &cap_urn, None, true).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));
    }

    #[test]
    fn missing_previous_output_is_not_found() {
        let cap_urn = CapUrn::parse("cap:in=media:pdf;out=media:png").unwrap();
        let binding = ArgumentBinding::PreviousOutput {
            node_id: "missing".into(),
            field: None,
        };
        let err = resolve_binding(&binding, &ctx(), &cap_urn, None, true).unwrap_err();
        assert!(matches!(err, PlannerError::NotFound(_)));
    }

    #[test]
    fn optional_missing_default_resolves_empty() {
        let cap_urn = CapUrn::parse("cap:in=media:pdf;out=media:png").unwrap();
        let resolved =
            resolve_binding(&ArgumentBinding::CapDefault, &ctx(), &cap_urn, None, false).unwrap();
        assert!(resolved.bytes.is_empty());
    }
}
