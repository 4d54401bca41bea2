//! Mock implementations of the collaborator traits
//!
//! In-memory doubles for the invoker and member factory, usable from unit and
//! integration tests without any transport layer.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use groupcall_core::{
    InvocationFailure, Invoker, MemberCall, MemberFactory, Payload, TargetRef,
};

type ResponseFn = dyn Fn(&TargetRef, &str, &[Value]) -> Value + Send + Sync;

/// A call observed by [`MockInvoker`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub target: TargetRef,
    pub method: String,
    pub arguments: Vec<Value>,
    pub payload: Payload,
}

/// Mock implementation of Invoker for testing
///
/// By default every member answers `{"target", "method", "args"}`. Clones
/// share the same recorded state.
#[derive(Clone)]
pub struct MockInvoker {
    failing: Arc<Mutex<HashSet<String>>>,
    panicking: Arc<Mutex<HashSet<String>>>,
    latency: Option<Duration>,
    latency_for: HashMap<String, Duration>,
    response: Option<Arc<ResponseFn>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self {
            failing: Arc::new(Mutex::new(HashSet::new())),
            panicking: Arc::new(Mutex::new(HashSet::new())),
            latency: None,
            latency_for: HashMap::new(),
            response: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(self, target_id: &str) -> Self {
        self.fail(target_id);
        self
    }

    pub fn panicking_on(self, target_id: &str) -> Self {
        self.panicking.lock().unwrap().insert(target_id.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_latency_for(mut self, target_id: &str, latency: Duration) -> Self {
        self.latency_for.insert(target_id.to_string(), latency);
        self
    }

    pub fn returning<F>(mut self, response: F) -> Self
    where
        F: Fn(&TargetRef, &str, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(response));
        self
    }

    /// Make a target fail from now on
    pub fn fail(&self, target_id: &str) {
        self.failing.lock().unwrap().insert(target_id.to_string());
    }

    pub fn heal(&self, target_id: &str) {
        self.failing.lock().unwrap().remove(target_id);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, target_id: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.target.id == target_id)
            .cloned()
            .collect()
    }

    /// Highest number of invocations observed running at the same time
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
        self.max_active.store(0, Ordering::SeqCst);
    }

    fn latency_of(&self, target_id: &str) -> Option<Duration> {
        self.latency_for.get(target_id).copied().or(self.latency)
    }
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockInvoker")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    async fn invoke(&self, target: &TargetRef, call: &MemberCall) -> Result<Value, InvocationFailure> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(latency) = self.latency_of(&target.id) {
            tokio::time::sleep(latency).await;
        }

        let arguments = call
            .payload
            .arguments()
            .map(|args| args.into_owned())
            .map_err(|e| InvocationFailure::transport(e.to_string()));

        self.calls.lock().unwrap().push(RecordedCall {
            target: target.clone(),
            method: call.method.to_string(),
            arguments: arguments.clone().unwrap_or_default(),
            payload: call.payload.clone(),
        });
        self.active.fetch_sub(1, Ordering::SeqCst);

        let panics = self.panicking.lock().unwrap().contains(&target.id);
        if panics {
            panic!("member {} exploded", target.id);
        }
        let fails = self.failing.lock().unwrap().contains(&target.id);
        if fails {
            return Err(InvocationFailure::application(format!(
                "member {} failed on {}",
                target.id, call.method
            )));
        }

        let arguments = arguments?;
        Ok(match &self.response {
            Some(response) => response(target, &call.method[..], &arguments),
            None => json!({
                "target": target.id,
                "method": &*call.method,
                "args": arguments,
            }),
        })
    }

    fn name(&self) -> &str {
        "MockInvoker"
    }
}

/// Mock implementation of MemberFactory for testing
#[derive(Debug, Clone)]
pub struct MockMemberFactory {
    prefix: String,
    local: bool,
    failing: Arc<Mutex<HashSet<usize>>>,
    created: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MockMemberFactory {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            local: false,
            failing: Arc::new(Mutex::new(HashSet::new())),
            created: Arc::new(AtomicUsize::new(0)),
            latency: None,
        }
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    pub fn failing_at(self, index: usize) -> Self {
        self.failing.lock().unwrap().insert(index);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemberFactory for MockMemberFactory {
    async fn create(&self, index: usize, params: &Value) -> Result<TargetRef, InvocationFailure> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().unwrap().contains(&index) {
            return Err(InvocationFailure::creation(format!(
                "cannot create member {index} from {params}"
            )));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{}", self.prefix, index);
        Ok(if self.local {
            TargetRef::local(id)
        } else {
            TargetRef::remote(id)
        })
    }

    fn name(&self) -> &str {
        "MockMemberFactory"
    }
}
