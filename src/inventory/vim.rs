//! vSphere client over the VI/JSON protocol (`/sdk/vim25/{release}/...`).
//!
//! Every managed-object method is a `POST {base}/{type}/{id}/{method}` with a
//! JSON body; data objects carry a `_typeName` discriminator and faults come
//! back as non-2xx responses whose body is the fault object.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{CollectError, Result, ScopeError, VimError};
use crate::inventory::{
    Deadline, EntityKind, InventoryClient, InventoryScope, NamePattern, ObjectReference,
    PropertySpec, StructuredRecord,
};

const SESSION_HEADER: &str = "vmware-api-session-id";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MoRef {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
}

impl MoRef {
    pub fn new(type_name: &str, value: &str) -> Self {
        MoRef {
            type_name: type_name.to_string(),
            value: value.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "_typeName": "ManagedObjectReference",
            "type": self.type_name,
            "value": self.value,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceContent {
    root_folder: MoRef,
    property_collector: MoRef,
    view_manager: MoRef,
    session_manager: MoRef,
}

#[derive(Debug, Default, Deserialize)]
struct RetrieveResult {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    objects: Vec<ObjectContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectContent {
    obj: MoRef,
    #[serde(default)]
    prop_set: Vec<DynamicProperty>,
}

#[derive(Debug, Deserialize)]
struct DynamicProperty {
    name: String,
    #[serde(default)]
    val: Value,
}

impl ObjectContent {
    fn property(&self, name: &str) -> Option<&Value> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }

    fn string_property(&self, name: &str) -> Option<String> {
        self.property(name).and_then(Value::as_str).map(str::to_string)
    }

    fn moref_property(&self, name: &str) -> Option<MoRef> {
        self.property(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn into_record(self) -> Option<StructuredRecord> {
        let kind = EntityKind::from_type_name(&self.obj.type_name)?;
        let reference = ObjectReference::new(kind, self.obj.value);
        Some(
            self.prop_set
                .into_iter()
                .fold(StructuredRecord::new(reference), |record, prop| {
                    record.with_property(&prop.name, prop.val)
                }),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaultBody {
    #[serde(rename = "_typeName")]
    type_name: Option<String>,
    #[serde(default)]
    fault_message: Vec<LocalizableMessage>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizableMessage {
    #[serde(default)]
    message: Option<String>,
}

/// Turn a non-2xx response body into a fault error.
fn decode_fault(status: u16, body: &str) -> VimError {
    let fault: FaultBody = serde_json::from_str(body).unwrap_or_default();
    let message = fault
        .message
        .or_else(|| fault.fault_message.into_iter().find_map(|m| m.message))
        .unwrap_or_else(|| format!("HTTP {}", status));
    VimError::Fault {
        type_name: fault.type_name.unwrap_or_else(|| format!("HTTP{}", status)),
        message,
    }
}

/// Filter spec selecting `paths` of every `type_name` object inside a container view.
fn view_filter_spec(view: &MoRef, type_name: &str, paths: &[&str]) -> Value {
    json!({
        "_typeName": "PropertyFilterSpec",
        "propSet": [{
            "_typeName": "PropertySpec",
            "type": type_name,
            "pathSet": paths,
        }],
        "objectSet": [{
            "_typeName": "ObjectSpec",
            "obj": view.to_json(),
            "skip": true,
            "selectSet": [{
                "_typeName": "TraversalSpec",
                "name": "traverseView",
                "type": "ContainerView",
                "path": "view",
                "skip": false,
            }],
        }],
    })
}

/// Filter spec selecting `spec.paths` directly on each referenced object.
fn batch_filter_spec(refs: &[ObjectReference], spec: &PropertySpec) -> Value {
    let objects: Vec<Value> = refs
        .iter()
        .map(|r| {
            json!({
                "_typeName": "ObjectSpec",
                "obj": MoRef::new(r.kind.type_name(), &r.value).to_json(),
            })
        })
        .collect();
    json!({
        "_typeName": "PropertyFilterSpec",
        "propSet": [{
            "_typeName": "PropertySpec",
            "type": spec.kind.type_name(),
            "pathSet": spec.paths,
        }],
        "objectSet": objects,
    })
}

/// Pick the pass's datacenter out of every datacenter the server knows.
pub(crate) fn select_datacenter(
    candidates: Vec<InventoryScope>,
    designated: Option<&str>,
) -> std::result::Result<InventoryScope, ScopeError> {
    if let Some(name) = designated {
        return candidates
            .into_iter()
            .find(|dc| dc.name == name)
            .ok_or_else(|| ScopeError::DesignatedNotFound {
                name: name.to_string(),
            });
    }
    let count = candidates.len();
    let mut candidates = candidates.into_iter();
    match (candidates.next(), count) {
        (None, _) => Err(ScopeError::NotFound),
        (Some(only), 1) => Ok(only),
        (Some(_), count) => Err(ScopeError::Ambiguous { count }),
    }
}

fn scope_from_content(content: ObjectContent) -> Option<InventoryScope> {
    let name = content.string_property("name")?;
    let datastore_folder = content.moref_property("datastoreFolder")?;
    let vm_folder = content.moref_property("vmFolder")?;
    Some(InventoryScope {
        name,
        datacenter: content.obj.value,
        datastore_folder: datastore_folder.value,
        vm_folder: vm_folder.value,
    })
}

/// Whether an object with this name (if it reported one) is collected.
/// Nameless objects only pass a match-all pattern.
fn name_selected(name: Option<&str>, pattern: &NamePattern) -> bool {
    match name {
        Some(name) => pattern.matches(name),
        None => pattern.is_match_all(),
    }
}

/// Send with whatever is left of the run deadline as the request timeout.
fn send(request: RequestBuilder, deadline: &Deadline) -> std::result::Result<Response, VimError> {
    let spent = || VimError::DeadlineExceeded {
        timeout: deadline.timeout(),
    };
    let remaining = deadline.remaining().ok_or_else(spent)?;
    request.timeout(remaining).send().map_err(|e| {
        if e.is_timeout() && deadline.remaining().is_none() {
            spent()
        } else {
            e.into()
        }
    })
}

/// An authenticated VI/JSON session.
pub struct VimClient {
    http: Client,
    base: Url,
    content: ServiceContent,
    session: String,
    deadline: Deadline,
}

impl VimClient {
    /// Fetch the service content and log in. Any failure here is an auth error,
    /// except running out of `deadline`.
    pub fn connect(config: &ConnectionConfig, deadline: Deadline) -> Result<Self> {
        let endpoint = config.endpoint.to_string();
        let auth = |source: VimError| {
            CollectError::from_vim(source, |source| CollectError::Auth {
                endpoint: endpoint.clone(),
                source,
            })
        };

        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()
            .map_err(|e| auth(e.into()))?;
        let base = config.api_base();

        info!(endpoint = %endpoint, release = %config.api_release, "connecting");

        let content_url = method_url(&base, &MoRef::new("ServiceInstance", "ServiceInstance"), "content");
        let content: ServiceContent = send(http.get(content_url), &deadline)
            .and_then(read_json)
            .map_err(auth)?
            .ok_or_else(|| {
                auth(VimError::Fault {
                    type_name: "ServiceContent".to_string(),
                    message: "empty service content".to_string(),
                })
            })?;

        let login_url = method_url(&base, &content.session_manager, "Login");
        let login = http.post(login_url).json(&json!({
            "userName": config.username,
            "password": config.password,
        }));
        let response = send(login, &deadline).map_err(auth)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(auth(decode_fault(status.as_u16(), &body)));
        }
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| auth(VimError::MissingSession))?;

        info!(endpoint = %endpoint, user = %config.username, "session established");
        Ok(VimClient {
            http,
            base,
            content,
            session,
            deadline,
        })
    }

    /// End the session. Failures are only logged.
    pub fn logout(&self) {
        let manager = &self.content.session_manager;
        if let Err(e) = self.invoke::<Value>(manager, "Logout", &json!({})) {
            warn!(error = %e, "logout failed");
        }
    }

    fn invoke<T: DeserializeOwned>(
        &self,
        target: &MoRef,
        method: &str,
        body: &Value,
    ) -> std::result::Result<Option<T>, VimError> {
        debug!(target = %target.value, method, "invoke");
        let request = self
            .http
            .post(method_url(&self.base, target, method))
            .header(SESSION_HEADER, &self.session)
            .json(body);
        send(request, &self.deadline).and_then(read_json)
    }

    /// Retrieve with `spec_set`, following continuation tokens to the end.
    fn retrieve_all(&self, spec_set: Value) -> std::result::Result<Vec<ObjectContent>, VimError> {
        let collector = &self.content.property_collector;
        let first: Option<RetrieveResult> = self.invoke(
            collector,
            "RetrievePropertiesEx",
            &json!({
                "specSet": [spec_set],
                "options": {"_typeName": "RetrieveOptions"},
            }),
        )?;

        let mut result = first.unwrap_or_default();
        let mut objects = std::mem::take(&mut result.objects);
        while let Some(token) = result.token.take() {
            let next: Option<RetrieveResult> = self.invoke(
                collector,
                "ContinueRetrievePropertiesEx",
                &json!({"token": token}),
            )?;
            result = next.unwrap_or_default();
            objects.append(&mut result.objects);
        }
        Ok(objects)
    }

    /// Properties of every `type_name` object below `container`, recursively.
    fn retrieve_in_container(
        &self,
        container: &MoRef,
        type_name: &str,
        paths: &[&str],
    ) -> std::result::Result<Vec<ObjectContent>, VimError> {
        let view: MoRef = self
            .invoke(
                &self.content.view_manager,
                "CreateContainerView",
                &json!({
                    "container": container.to_json(),
                    "type": [type_name],
                    "recursive": true,
                }),
            )?
            .ok_or(VimError::Fault {
                type_name: "CreateContainerView".to_string(),
                message: "no view returned".to_string(),
            })?;

        let objects = self.retrieve_all(view_filter_spec(&view, type_name, paths));

        if let Err(e) = self.invoke::<Value>(&view, "DestroyView", &json!({})) {
            warn!(view = %view.value, error = %e, "failed to destroy container view");
        }
        objects
    }
}

fn method_url(base: &Url, target: &MoRef, method: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend([target.type_name.as_str(), target.value.as_str(), method]);
    }
    url
}

/// Decode a response. Empty or `null` bodies (void methods) come back as `None`.
fn read_json<T: DeserializeOwned>(response: Response) -> std::result::Result<Option<T>, VimError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(decode_fault(status.as_u16(), &body));
    }
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

impl InventoryClient for VimClient {
    fn resolve_default_scope(&self, designated: Option<&str>) -> Result<InventoryScope> {
        let objects = self
            .retrieve_in_container(
                &self.content.root_folder,
                "Datacenter",
                &["name", "datastoreFolder", "vmFolder"],
            )
            .map_err(|source| CollectError::from_vim(source, |e| ScopeError::from(e).into()))?;

        let candidates: Vec<InventoryScope> =
            objects.into_iter().filter_map(scope_from_content).collect();
        let scope = select_datacenter(candidates, designated)?;

        info!(datacenter = %scope.name, id = %scope.datacenter, "datacenter resolved");
        Ok(scope)
    }

    fn list_objects(
        &self,
        scope: &InventoryScope,
        kind: EntityKind,
        pattern: &NamePattern,
    ) -> Result<Vec<ObjectReference>> {
        let folder = MoRef::new("Folder", scope.root_for(kind));
        let objects = self
            .retrieve_in_container(&folder, kind.type_name(), &["name"])
            .map_err(|source| {
                CollectError::from_vim(source, |source| CollectError::Enumeration { kind, source })
            })?;

        Ok(objects
            .into_iter()
            .filter(|o| o.obj.type_name == kind.type_name())
            .filter(|o| name_selected(o.string_property("name").as_deref(), pattern))
            .map(|o| ObjectReference::new(kind, o.obj.value))
            .collect())
    }

    fn retrieve_properties(
        &self,
        refs: &[ObjectReference],
        spec: &PropertySpec,
    ) -> Result<Vec<StructuredRecord>> {
        let objects = self
            .retrieve_all(batch_filter_spec(refs, spec))
            .map_err(|source| {
                CollectError::from_vim(source, |source| CollectError::Retrieval {
                    kind: spec.kind,
                    source,
                })
            })?;

        Ok(objects
            .into_iter()
            .filter_map(ObjectContent::into_record)
            .collect())
    }
}
