//! Shared test doubles

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use wallet_bridge_core::{Error, Result, RpcTransport};

pub const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Node double answering from a per-method script and recording every call.
/// The last scripted answer for a method repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<std::result::Result<Value, String>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: &str, value: Value) -> Self {
        self.push(method, Ok(value))
    }

    pub fn fail(self, method: &str, message: &str) -> Self {
        self.push(method, Err(message.to_string()))
    }

    fn push(self, method: &str, response: std::result::Result<Value, String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn request_value(&self, method: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(method)
            .ok_or_else(|| Error::ChainError(format!("unexpected method {}", method)))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(Error::ChainError(message)),
            None => Err(Error::ChainError(format!("no response for {}", method))),
        }
    }
}
