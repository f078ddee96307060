use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::proto::RpcMethod;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("template error: {0}")]
    Render(#[from] minijinja::Error),

    #[error("rendered document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-call substitution context. Built once per call, so rendering the
/// same context twice yields identical output.
#[derive(Debug, Serialize)]
pub(crate) struct CallTemplateData {
    pub(crate) request_number: u64,
    pub(crate) fully_qualified_name: String,
    pub(crate) method_name: String,
    pub(crate) service_name: String,
    pub(crate) input_name: String,
    pub(crate) output_name: String,
    pub(crate) timestamp: String,
    pub(crate) timestamp_unix: u64,
    pub(crate) timestamp_unix_nanos: u64,
    pub(crate) uuid: String,
}

impl CallTemplateData {
    pub(crate) fn new(method: &RpcMethod, request_number: u64) -> Self {
        let now = SystemTime::now();
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();

        Self {
            request_number,
            fully_qualified_name: method.full_name().to_string(),
            method_name: method.name().to_string(),
            service_name: method.service_full_name(),
            input_name: method.input().full_name().to_string(),
            output_name: method.output().full_name().to_string(),
            timestamp: humantime::format_rfc3339(now).to_string(),
            timestamp_unix: since_epoch.as_secs(),
            timestamp_unix_nanos: u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX),
            uuid: uuid::Uuid::new_v4().to_string(),
        }
    }
}

const DATA_TEMPLATE: &str = "data";
const METADATA_TEMPLATE: &str = "metadata";

/// Pre-parsed payload and metadata templates for a run. The documents
/// are serialized to JSON once and re-rendered per call.
#[derive(Debug, Clone)]
pub(crate) struct Templates {
    env: Environment<'static>,
    has_metadata: bool,
}

impl Templates {
    pub(crate) fn new(
        data: &serde_json::Value,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_template_owned(DATA_TEMPLATE.to_string(), serde_json::to_string(data)?)?;

        let has_metadata = match metadata {
            Some(md) if !md.is_empty() => {
                env.add_template_owned(METADATA_TEMPLATE.to_string(), serde_json::to_string(md)?)?;
                true
            }
            _ => false,
        };

        Ok(Self { env, has_metadata })
    }

    pub(crate) fn render_data(&self, ctd: &CallTemplateData) -> Result<serde_json::Value> {
        let rendered = self.env.get_template(DATA_TEMPLATE)?.render(ctd)?;
        Ok(serde_json::from_str(&rendered)?)
    }

    pub(crate) fn render_metadata(&self, ctd: &CallTemplateData) -> Result<Vec<(String, String)>> {
        if !self.has_metadata {
            return Ok(Vec::new());
        }
        let rendered = self.env.get_template(METADATA_TEMPLATE)?.render(ctd)?;
        let map: BTreeMap<String, String> = serde_json::from_str(&rendered)?;
        Ok(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Schema;

    fn method() -> RpcMethod {
        Schema::from_pool(hammr_testserver::descriptor_pool())
            .method("hammr.test.EchoService/Echo")
            .expect("test method resolves")
    }

    #[test]
    fn renders_request_number_into_payload() {
        let data = serde_json::json!({ "message": "call-{{ request_number }}" });
        let templates = Templates::new(&data, None).expect("templates parse");
        let ctd = CallTemplateData::new(&method(), 42);

        let rendered = templates.render_data(&ctd).expect("render succeeds");
        assert_eq!(rendered, serde_json::json!({ "message": "call-42" }));
    }

    #[test]
    fn rendering_is_deterministic_for_one_context() {
        let data = serde_json::json!({ "message": "{{ uuid }}/{{ method_name }}" });
        let templates = Templates::new(&data, None).expect("templates parse");
        let ctd = CallTemplateData::new(&method(), 1);

        let first = templates.render_data(&ctd).expect("render succeeds");
        let second = templates.render_data(&ctd).expect("render succeeds");
        assert_eq!(first, second);
    }

    #[test]
    fn renders_metadata_map() {
        let data = serde_json::json!({ "message": "hi" });
        let metadata: BTreeMap<String, String> = [
            ("x-request-id".to_string(), "{{ uuid }}".to_string()),
            ("x-method".to_string(), "{{ method_name }}".to_string()),
        ]
        .into_iter()
        .collect();

        let templates = Templates::new(&data, Some(&metadata)).expect("templates parse");
        let ctd = CallTemplateData::new(&method(), 1);
        let rendered = templates.render_metadata(&ctd).expect("render succeeds");

        assert_eq!(rendered.len(), 2);
        assert!(rendered.contains(&("x-method".to_string(), "Echo".to_string())));
    }

    #[test]
    fn missing_metadata_renders_empty() {
        let templates =
            Templates::new(&serde_json::json!({ "message": "hi" }), None).expect("templates parse");
        let ctd = CallTemplateData::new(&method(), 1);
        assert!(templates.render_metadata(&ctd).expect("render").is_empty());
    }

    #[test]
    fn syntax_errors_fail_at_construction() {
        let data = serde_json::json!({ "message": "{{ unclosed" });
        assert!(Templates::new(&data, None).is_err());
    }

    #[test]
    fn unknown_variables_fail_at_render() {
        let data = serde_json::json!({ "message": "{{ no_such_field }}" });
        let templates = Templates::new(&data, None).expect("syntax is valid");
        let ctd = CallTemplateData::new(&method(), 1);
        assert!(templates.render_data(&ctd).is_err());
    }
}
