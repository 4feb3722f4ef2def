//! Scripted in-memory gateway for scenario tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ResourceKind;
use crate::error::{GatewayError, HalldyllError, Result};

use super::{
    ApiResponse, CreateDeploymentRequest, GPU_CLASSES_PATH, HttpMethod, RemoteDeployment,
    RemoteGateway, ResourceId, UpdateDeploymentRequest,
};

/// A scripted outcome of a remote call.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Found(RemoteDeployment),
    NotFound,
    Timeout,
    Fail(u16),
}

#[derive(Debug)]
struct Inner {
    created_id: String,
    create_echo: RemoteDeployment,
    gets: VecDeque<Scripted>,
    get_default: Scripted,
    update_echo: RemoteDeployment,
    delete: Scripted,
    scaling: Value,
    gpu_classes: Value,
    calls: Vec<String>,
    creates: Vec<CreateDeploymentRequest>,
    updates: Vec<UpdateDeploymentRequest>,
    bodies: Vec<Value>,
}

#[derive(Debug)]
pub(crate) struct FakeGateway {
    inner: Mutex<Inner>,
    get_delay: Option<Duration>,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                created_id: String::from("dep-1"),
                create_echo: RemoteDeployment::default(),
                gets: VecDeque::new(),
                get_default: Scripted::NotFound,
                update_echo: RemoteDeployment::default(),
                delete: Scripted::Found(RemoteDeployment::default()),
                scaling: Value::Null,
                gpu_classes: Value::Array(Vec::new()),
                calls: Vec::new(),
                creates: Vec::new(),
                updates: Vec::new(),
                bodies: Vec::new(),
            }),
            get_delay: None,
        }
    }

    pub(crate) fn with_created(self, id: &str, echo: RemoteDeployment) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.created_id = id.to_string();
            inner.create_echo = echo;
        }
        self
    }

    pub(crate) fn with_gets(self, gets: impl IntoIterator<Item = Scripted>) -> Self {
        self.inner.lock().unwrap().gets.extend(gets);
        self
    }

    pub(crate) fn with_get_default(self, outcome: Scripted) -> Self {
        self.inner.lock().unwrap().get_default = outcome;
        self
    }

    pub(crate) fn with_update(self, echo: RemoteDeployment) -> Self {
        self.inner.lock().unwrap().update_echo = echo;
        self
    }

    pub(crate) fn with_delete(self, outcome: Scripted) -> Self {
        self.inner.lock().unwrap().delete = outcome;
        self
    }

    pub(crate) fn with_scaling(self, scaling: Value) -> Self {
        self.inner.lock().unwrap().scaling = scaling;
        self
    }

    pub(crate) fn with_gpu_classes(self, classes: Value) -> Self {
        self.inner.lock().unwrap().gpu_classes = classes;
        self
    }

    pub(crate) fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn get_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with("get "))
            .count()
    }

    pub(crate) fn creates(&self) -> Vec<CreateDeploymentRequest> {
        self.inner.lock().unwrap().creates.clone()
    }

    pub(crate) fn updates(&self) -> Vec<UpdateDeploymentRequest> {
        self.inner.lock().unwrap().updates.clone()
    }

    pub(crate) fn bodies(&self) -> Vec<Value> {
        self.inner.lock().unwrap().bodies.clone()
    }

    fn record(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

impl Scripted {
    fn resolve(self, id: &ResourceId) -> Result<RemoteDeployment> {
        match self {
            Self::Found(deployment) => Ok(deployment),
            Self::NotFound => Err(GatewayError::NotFound {
                resource: id.to_string(),
            }
            .into()),
            Self::Timeout => Err(GatewayError::classify(Some(504), &id.path(), "gateway timeout").into()),
            Self::Fail(status) => Err(GatewayError::classify(Some(status), &id.path(), "scripted failure").into()),
        }
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn create(
        &self,
        kind: ResourceKind,
        request: &CreateDeploymentRequest,
    ) -> Result<(ResourceId, RemoteDeployment)> {
        self.record(format!("create {}", kind.collection()));
        let mut inner = self.inner.lock().unwrap();
        inner.creates.push(request.clone());
        let id = ResourceId::new(kind, inner.created_id.clone());
        Ok((id, inner.create_echo.clone()))
    }

    async fn get(&self, id: &ResourceId) -> Result<RemoteDeployment> {
        self.record(format!("get {}", id.path()));
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            let default = inner.get_default.clone();
            inner.gets.pop_front().unwrap_or(default)
        };
        outcome.resolve(id)
    }

    async fn update(
        &self,
        id: &ResourceId,
        request: &UpdateDeploymentRequest,
    ) -> Result<RemoteDeployment> {
        self.record(format!("update {}", id.path()));
        if !id.kind.supports_update() {
            return Err(GatewayError::Unsupported {
                operation: String::from("update"),
                kind: id.kind.to_string(),
            }
            .into());
        }
        let mut inner = self.inner.lock().unwrap();
        inner.updates.push(request.clone());
        Ok(inner.update_echo.clone())
    }

    async fn delete(&self, id: &ResourceId, _timeout_hint: Duration) -> Result<()> {
        self.record(format!("delete {}", id.path()));
        let outcome = self.inner.lock().unwrap().delete.clone();
        outcome.resolve(id).map(|_| ())
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        self.record(format!("{} {path}", method.as_str().to_lowercase()));
        let mut inner = self.inner.lock().unwrap();
        if let Some(body) = body {
            inner.bodies.push(body.clone());
            return Ok(ApiResponse { status: 200, body });
        }
        let body = if path == GPU_CLASSES_PATH {
            inner.gpu_classes.clone()
        } else if path.ends_with("/scaling") {
            inner.scaling.clone()
        } else {
            return Err(HalldyllError::Gateway(GatewayError::NotFound {
                resource: path.to_string(),
            }));
        };
        Ok(ApiResponse { status: 200, body })
    }
}
