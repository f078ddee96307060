use std::ffi::OsString;
use std::path::{Path, PathBuf};

use http::uri::PathAndQuery;
use prost::Message as _;
use prost_reflect::{DescriptorPool, MessageDescriptor, MethodDescriptor};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to locate protoc: {0}")]
    ProtocMissing(String),

    #[error("failed to run protoc: {0}")]
    ProtocIo(#[from] std::io::Error),

    #[error("protoc failed (exit={exit}): {stderr}")]
    ProtocFailed { exit: i32, stderr: String },

    #[error("failed to decode FileDescriptorSet: {0}")]
    DescriptorDecode(#[from] prost::DecodeError),

    #[error("failed to build descriptor pool: {0}")]
    DescriptorPool(#[from] prost_reflect::DescriptorError),

    #[error("invalid full method name (expected 'pkg.Service/Method'): {0}")]
    InvalidFullMethod(String),

    #[error("service not found in schema: {0}")]
    ServiceNotFound(String),

    #[error("method not found in service '{service}': {method}")]
    MethodNotFound { service: String, method: String },

    #[error("invalid request path: {0}")]
    InvalidPath(String),
}

/// gRPC interaction pattern of a resolved method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CallKind {
    Unary,
    ClientStream,
    ServerStream,
    BidiStream,
}

impl CallKind {
    fn of(method: &MethodDescriptor) -> Self {
        match (method.is_client_streaming(), method.is_server_streaming()) {
            (false, false) => Self::Unary,
            (true, false) => Self::ClientStream,
            (false, true) => Self::ServerStream,
            (true, true) => Self::BidiStream,
        }
    }

    /// Whether the request side carries a message sequence.
    #[must_use]
    pub fn is_client_streaming(self) -> bool {
        matches!(self, Self::ClientStream | Self::BidiStream)
    }
}

/// A method resolved against the descriptor pool, with the request path
/// and call kind precomputed for the hot path.
#[derive(Debug, Clone)]
pub struct RpcMethod {
    method: MethodDescriptor,
    path: PathAndQuery,
    kind: CallKind,
}

impl RpcMethod {
    fn new(method: MethodDescriptor) -> Result<Self> {
        let path = format!(
            "/{}/{}",
            method.parent_service().full_name(),
            method.name()
        );
        let path = PathAndQuery::try_from(path.as_str()).map_err(|_| Error::InvalidPath(path))?;
        let kind = CallKind::of(&method);
        Ok(Self { method, path, kind })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.method.name()
    }

    /// Fully-qualified name, e.g. `pkg.Service.Method`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.method.full_name()
    }

    #[must_use]
    pub fn service_full_name(&self) -> String {
        self.method.parent_service().full_name().to_string()
    }

    #[must_use]
    pub fn input(&self) -> MessageDescriptor {
        self.method.input()
    }

    #[must_use]
    pub fn output(&self) -> MessageDescriptor {
        self.method.output()
    }

    #[must_use]
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub(crate) fn path(&self) -> &PathAndQuery {
        &self.path
    }
}

/// A compiled protobuf schema from which methods are resolved.
#[derive(Debug, Clone)]
pub struct Schema {
    pool: DescriptorPool,
}

impl Schema {
    /// Compiles a `.proto` file by shelling out to `protoc` and loads
    /// the resulting descriptor set. `protoc` is resolved from the
    /// `PROTOC` environment variable, a binary next to the current
    /// executable, or `PATH`, in that order.
    pub fn compile(proto: &Path, import_paths: &[PathBuf]) -> Result<Self> {
        let mut includes: Vec<PathBuf> = import_paths.to_vec();
        if let Some(dir) = proto.parent() {
            includes.push(dir.to_path_buf());
        }

        // Deduplicate while preserving order.
        let mut seen: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();
        includes.retain(|p| seen.insert(p.clone()));

        let protoc = resolve_protoc()?;

        let out = tempfile::NamedTempFile::new()?;
        let out_path = out.path().to_path_buf();

        let mut cmd = std::process::Command::new(protoc);
        cmd.arg("--include_imports")
            .arg(format!("--descriptor_set_out={}", out_path.display()));
        for include in &includes {
            cmd.arg("-I").arg(include);
        }
        cmd.arg(proto);

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(Error::ProtocFailed {
                exit: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let bytes = std::fs::read(&out_path)?;
        let fds = prost_types::FileDescriptorSet::decode(bytes.as_slice())?;
        Self::from_file_descriptor_set(fds)
    }

    /// Builds a schema from an already-compiled descriptor set.
    pub fn from_file_descriptor_set(fds: prost_types::FileDescriptorSet) -> Result<Self> {
        let pool = DescriptorPool::from_file_descriptor_set(fds)?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    /// Resolves `pkg.Service/Method` to a callable method.
    pub fn method(&self, full_method: &str) -> Result<RpcMethod> {
        let (service_name, method_name) = full_method
            .split_once('/')
            .ok_or_else(|| Error::InvalidFullMethod(full_method.to_string()))?;

        let service = self
            .pool
            .get_service_by_name(service_name)
            .ok_or_else(|| Error::ServiceNotFound(service_name.to_string()))?;

        let method = service
            .methods()
            .find(|m| m.name() == method_name)
            .ok_or_else(|| Error::MethodNotFound {
                service: service_name.to_string(),
                method: method_name.to_string(),
            })?;

        RpcMethod::new(method)
    }
}

fn resolve_protoc() -> Result<OsString> {
    if let Some(path) = std::env::var_os("PROTOC") {
        if !path.is_empty() {
            return Ok(path);
        }
    }

    if let Some(path) = sibling_protoc() {
        return Ok(path.into_os_string());
    }

    if protoc_is_runnable(Path::new("protoc")) {
        return Ok(OsString::from("protoc"));
    }

    Err(Error::ProtocMissing(
        "install protoc and ensure it is on PATH, set PROTOC=/path/to/protoc, \
         or place protoc next to the hammr binary"
            .to_string(),
    ))
}

fn sibling_protoc() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;

    let filename = if cfg!(windows) { "protoc.exe" } else { "protoc" };
    let candidate = dir.join(filename);
    if candidate.is_file() && protoc_is_runnable(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

fn protoc_is_runnable(path: &Path) -> bool {
    match std::process::Command::new(path).arg("--version").output() {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_pool(hammr_testserver::descriptor_pool())
    }

    #[test]
    fn resolves_method_with_path_and_kind() {
        let method = schema()
            .method("hammr.test.EchoService/Echo")
            .expect("method resolves");

        assert_eq!(method.name(), "Echo");
        assert_eq!(method.full_name(), "hammr.test.EchoService.Echo");
        assert_eq!(method.path().as_str(), "/hammr.test.EchoService/Echo");
        assert_eq!(method.kind(), CallKind::Unary);
        assert_eq!(method.input().full_name(), "hammr.test.EchoRequest");
    }

    #[test]
    fn detects_streaming_kinds() {
        let schema = schema();
        let kind = |name: &str| {
            schema
                .method(&format!("hammr.test.EchoService/{name}"))
                .expect("method resolves")
                .kind()
        };

        assert_eq!(kind("Collect"), CallKind::ClientStream);
        assert_eq!(kind("Expand"), CallKind::ServerStream);
        assert_eq!(kind("Chat"), CallKind::BidiStream);
        assert!(kind("Chat").is_client_streaming());
        assert!(!kind("Expand").is_client_streaming());
    }

    #[test]
    fn rejects_malformed_and_unknown_names() {
        let schema = schema();
        assert!(matches!(
            schema.method("no-slash"),
            Err(Error::InvalidFullMethod(_))
        ));
        assert!(matches!(
            schema.method("hammr.test.Nope/Echo"),
            Err(Error::ServiceNotFound(_))
        ));
        assert!(matches!(
            schema.method("hammr.test.EchoService/Nope"),
            Err(Error::MethodNotFound { .. })
        ));
    }
}
