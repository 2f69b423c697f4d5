//! Fetch stores.
//!
//! A fetch store wraps one remote call in the standard action sequence. For a
//! base name such as `getReport` the builder produces:
//!
//! | Member | Name |
//! |--------|------|
//! | async action | `fetchGetReport(...args)` |
//! | sync action | `receiveGetReport(response, params)` |
//! | selector | `isFetchingGetReport(...args)` |
//! | control | `FETCH_GET_REPORT` |
//! | state key | `isFetchingGetReport` (params signature → bool) |
//!
//! `fetch*` turns its arguments into params, validates them, then dispatches
//! `START_FETCH_*`, calls the control and finishes with either `RECEIVE_*` +
//! `FINISH_FETCH_*` or `CATCH_FETCH_*`.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value, json};
use sitekit_types::{Action, ApiError, ArgSignature};

use crate::error::StoreError;
use crate::registry::StoreContext;
use crate::store::{ControlFn, StoreDefinition, StoreState, arg, with_key};

type ReceiveFn = Arc<dyn Fn(&StoreState, &Value, &Value) -> StoreState + Send + Sync>;
type ArgsToParamsFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;
type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Member and action names derived from a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchNames {
    pub fetch: String,
    pub receive: String,
    pub is_fetching: String,
    pub control: String,
    pub start_type: String,
    pub receive_type: String,
    pub finish_type: String,
    pub catch_type: String,
}

impl FetchNames {
    #[must_use]
    pub fn new(base_name: &str) -> Self {
        let pascal = upper_first(base_name);
        let constant = constant_case(base_name);
        Self {
            fetch: format!("fetch{pascal}"),
            receive: format!("receive{pascal}"),
            is_fetching: format!("isFetching{pascal}"),
            control: format!("FETCH_{constant}"),
            start_type: format!("START_FETCH_{constant}"),
            receive_type: format!("RECEIVE_{constant}"),
            finish_type: format!("FINISH_FETCH_{constant}"),
            catch_type: format!("CATCH_FETCH_{constant}"),
        }
    }
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn constant_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_uppercase());
    }
    out
}

pub struct FetchStoreBuilder {
    base_name: String,
    control: ControlFn,
    receive: Option<ReceiveFn>,
    args_to_params: ArgsToParamsFn,
    validate_params: ValidateFn,
}

impl FetchStoreBuilder {
    /// `control` performs the remote call for the validated params.
    pub fn new<F, Fut>(base_name: impl Into<String>, control: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        Self {
            base_name: base_name.into(),
            control: Arc::new(
                move |params: Value| -> BoxFuture<'static, Result<Value, ApiError>> {
                    Box::pin(control(params))
                },
            ),
            receive: None,
            args_to_params: Arc::new(|_: &[Value]| Value::Object(Map::new())),
            validate_params: Arc::new(|_: &Value| Ok(())),
        }
    }

    /// How `RECEIVE_*` folds a response into state.
    pub fn reducer<F>(mut self, receive: F) -> Self
    where
        F: Fn(&StoreState, &Value, &Value) -> StoreState + Send + Sync + 'static,
    {
        self.receive = Some(Arc::new(receive));
        self
    }

    pub fn args_to_params<F>(mut self, args_to_params: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.args_to_params = Arc::new(args_to_params);
        self
    }

    /// Reject params before anything is dispatched.
    pub fn validate_params<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate_params = Arc::new(validate);
        self
    }

    #[must_use]
    pub fn names(&self) -> FetchNames {
        FetchNames::new(&self.base_name)
    }

    #[must_use]
    pub fn build(self) -> StoreDefinition {
        let names = Arc::new(self.names());
        let control = self.control;

        let reducer_names = Arc::clone(&names);
        let receive = self.receive;
        let reducer = move |state: &StoreState, action: &Action| {
            let names = &reducer_names;
            let params = action.payload.get("params").cloned().unwrap_or(Value::Null);
            let kind = action.kind.as_str();
            if kind == names.start_type {
                Some(set_fetching(state, &names.is_fetching, &params, true))
            } else if kind == names.finish_type || kind == names.catch_type {
                Some(set_fetching(state, &names.is_fetching, &params, false))
            } else if kind == names.receive_type {
                let response = action.payload.get("response").cloned().unwrap_or(Value::Null);
                receive.as_ref().map(|receive| receive(state, &response, &params))
            } else {
                None
            }
        };

        let fetch_names = Arc::clone(&names);
        let args_to_params = Arc::clone(&self.args_to_params);
        let validate = self.validate_params;
        let fetch = move |ctx: StoreContext, args: Vec<Value>| {
            let names = Arc::clone(&fetch_names);
            let params = args_to_params(&args);
            let validation = validate(&params);
            async move {
                if let Err(message) = validation {
                    return Err(StoreError::invalid_arguments(&names.fetch, message));
                }

                let dispatch = ctx.dispatch();
                dispatch.apply(&Action::new(&names.start_type, json!({ "params": params })))?;
                match ctx.control(&names.control, params.clone()).await {
                    Ok(response) => {
                        dispatch.apply(&Action::new(
                            &names.receive_type,
                            json!({ "response": response.clone(), "params": params }),
                        ))?;
                        dispatch.apply(&Action::new(&names.finish_type, json!({ "params": params })))?;
                        Ok(response)
                    }
                    Err(err) => {
                        let error = match &err {
                            StoreError::Api(api) => api.to_value(),
                            other => Value::String(other.to_string()),
                        };
                        dispatch.apply(&Action::new(
                            &names.catch_type,
                            json!({ "params": params, "error": error }),
                        ))?;
                        Err(err)
                    }
                }
            }
        };

        let receive_type = names.receive_type.clone();
        let selector_params = Arc::clone(&self.args_to_params);
        let is_fetching_key = names.is_fetching.clone();

        StoreDefinition::new()
            .state(names.is_fetching.clone(), Value::Object(Map::new()))
            .reducer(reducer)
            .async_action(names.fetch.clone(), fetch)
            .action(names.receive.clone(), move |args| {
                Ok(Action::new(
                    &receive_type,
                    json!({ "response": arg(args, 0), "params": arg(args, 1) }),
                ))
            })
            .selector(names.is_fetching.clone(), move |ctx, args| {
                let signature = ArgSignature::of_value(&selector_params(args));
                let fetching = ctx
                    .get(&is_fetching_key)
                    .and_then(|table| table.get(signature.as_str()))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(Some(Value::Bool(fetching)))
            })
            .control(names.control.clone(), move |params| control(params))
    }
}

fn set_fetching(state: &StoreState, key: &str, params: &Value, fetching: bool) -> StoreState {
    let mut table = state
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    table.insert(
        ArgSignature::of_value(params).as_str().to_string(),
        Value::Bool(fetching),
    );
    with_key(state, key, Value::Object(table))
}
