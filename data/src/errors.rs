//! Error tracker slice.
//!
//! Every store that wants per-action and per-selector errors combines
//! [`error_store`] into its definition. Errors live in the `errors` state key
//! under `"{baseName}::{fingerprint}"`, where the fingerprint is derived from
//! the call's [`ArgSignature`]; the arguments themselves are kept under
//! `errorArgs` so a selector error can be traced back to the call that failed.
//!
//! The registry writes here on its own: a failed resolver or async action
//! records its error, a successful one clears the key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sitekit_types::{Action, ApiError, ArgSignature};

use crate::store::{StoreDefinition, StoreState, arg, with_key};

pub const ERRORS_KEY: &str = "errors";
pub const ERROR_ARGS_KEY: &str = "errorArgs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorAction {
    #[serde(rename_all = "camelCase")]
    ReceiveError {
        error: ApiError,
        base_name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    #[serde(rename_all = "camelCase")]
    ClearError {
        base_name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    #[serde(rename_all = "camelCase")]
    ClearErrors {
        #[serde(default)]
        base_name: Option<String>,
    },
}

/// Key an error is stored under.
#[must_use]
pub fn error_key(base_name: &str, args: &[Value]) -> String {
    format!("{base_name}::{}", ArgSignature::of(args).fingerprint())
}

#[must_use]
pub fn receive_error(error: &ApiError, base_name: &str, args: &[Value]) -> Action {
    Action::new(
        "RECEIVE_ERROR",
        json!({ "error": error.to_value(), "baseName": base_name, "args": args }),
    )
}

#[must_use]
pub fn clear_error(base_name: &str, args: &[Value]) -> Action {
    Action::new("CLEAR_ERROR", json!({ "baseName": base_name, "args": args }))
}

#[must_use]
pub fn clear_errors(base_name: Option<&str>) -> Action {
    let payload = match base_name {
        Some(base_name) => json!({ "baseName": base_name }),
        None => json!({}),
    };
    Action::new("CLEAR_ERRORS", payload)
}

/// Error recorded for `base_name` called with `args`, if any.
#[must_use]
pub fn error_from_state(state: &StoreState, base_name: &str, args: &[Value]) -> Option<ApiError> {
    let raw = state.get(ERRORS_KEY)?.get(error_key(base_name, args))?;
    serde_json::from_value(raw.clone()).ok()
}

fn tables(state: &StoreState) -> (Map<String, Value>, Map<String, Value>) {
    let table = |key: &str| {
        state
            .get(key)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };
    (table(ERRORS_KEY), table(ERROR_ARGS_KEY))
}

fn write_tables(state: &StoreState, errors: Map<String, Value>, args: Map<String, Value>) -> StoreState {
    let next = with_key(state, ERRORS_KEY, Value::Object(errors));
    with_key(&next, ERROR_ARGS_KEY, Value::Object(args))
}

fn reduce(state: &StoreState, action: ErrorAction) -> Option<StoreState> {
    let (mut errors, mut error_args) = tables(state);

    match action {
        ErrorAction::ReceiveError {
            error,
            base_name,
            args,
        } => {
            let key = error_key(&base_name, &args);
            errors.insert(key.clone(), error.to_value());
            error_args.insert(key, Value::Array(args));
        }
        ErrorAction::ClearError { base_name, args } => {
            let key = error_key(&base_name, &args);
            let removed_error = errors.remove(&key).is_some();
            let removed_args = error_args.remove(&key).is_some();
            if !removed_error && !removed_args {
                return None;
            }
        }
        ErrorAction::ClearErrors { base_name } => {
            if errors.is_empty() && error_args.is_empty() {
                return None;
            }
            match base_name {
                Some(base_name) => {
                    let prefix = format!("{base_name}::");
                    errors.retain(|key, _| !key.starts_with(&prefix));
                    error_args.retain(|key, _| !key.starts_with(&prefix));
                }
                None => {
                    errors.clear();
                    error_args.clear();
                }
            }
        }
    }

    Some(write_tables(state, errors, error_args))
}

fn args_array(value: &Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

/// The error tracker slice.
#[must_use]
pub fn error_store() -> StoreDefinition {
    StoreDefinition::new()
        .state(ERRORS_KEY, Value::Object(Map::new()))
        .state(ERROR_ARGS_KEY, Value::Object(Map::new()))
        .reducer_for(reduce)
        .action("receiveError", |args| {
            let error: ApiError = serde_json::from_value(arg(args, 0).clone())?;
            let base_name = arg(args, 1).as_str().unwrap_or_default();
            Ok(receive_error(&error, base_name, &args_array(arg(args, 2))))
        })
        .action("clearError", |args| {
            let base_name = arg(args, 0).as_str().unwrap_or_default();
            Ok(clear_error(base_name, &args_array(arg(args, 1))))
        })
        .action("clearErrors", |args| Ok(clear_errors(arg(args, 0).as_str())))
        .selector("getErrorForSelector", |ctx, args| Ok(lookup(ctx.state(), args)))
        .selector("getErrorForAction", |ctx, args| Ok(lookup(ctx.state(), args)))
        .selector("getError", |ctx, args| Ok(lookup(ctx.state(), args)))
        .selector("getErrors", |ctx, _| {
            let mut unique: Vec<Value> = Vec::new();
            if let Some(errors) = ctx.get(ERRORS_KEY).and_then(Value::as_object) {
                for error in errors.values() {
                    if !unique.contains(error) {
                        unique.push(error.clone());
                    }
                }
            }
            Ok(Some(Value::Array(unique)))
        })
        .selector("hasErrors", |ctx, _| {
            let any = ctx
                .get(ERRORS_KEY)
                .and_then(Value::as_object)
                .is_some_and(|errors| !errors.is_empty());
            Ok(Some(Value::Bool(any)))
        })
        .selector("getSelectorDataForError", |ctx, args| {
            let error = arg(args, 0);
            let Some(errors) = ctx.get(ERRORS_KEY).and_then(Value::as_object) else {
                return Ok(Some(Value::Null));
            };
            let Some(key) = errors
                .iter()
                .find_map(|(key, stored)| (stored == error).then_some(key))
            else {
                return Ok(Some(Value::Null));
            };
            let name = key.split_once("::").map_or(key.as_str(), |(name, _)| name);
            if !ctx.has_selector(name) {
                return Ok(Some(Value::Null));
            }
            let call_args = ctx
                .get(ERROR_ARGS_KEY)
                .and_then(|a| a.get(key))
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            Ok(Some(json!({
                "storeName": ctx.store_name(),
                "name": name,
                "args": call_args,
            })))
        })
}

/// `(baseName, args?)` lookup shared by the error selectors.
fn lookup(state: &StoreState, args: &[Value]) -> Option<Value> {
    let base_name = arg(args, 0).as_str()?;
    let call_args = args_array(arg(args, 1));
    state
        .get(ERRORS_KEY)?
        .get(error_key(base_name, &call_args))
        .cloned()
}
