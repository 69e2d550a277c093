//! Preview augmentation
//!
//! Before a config is handed to an engine container it is augmented with
//! preview taps: one `remap` transform per source and per sink that stamps
//! the event with its origin, all feeding a single HTTP sink that ships the
//! samples back to the dashboard.

use serde_json::{Map, Value, json};

/// Id of the sink every preview transform feeds
pub const PREVIEW_SINK_ID: &str = "preview_sink";

/// Rewrites a pipeline config before it is deployed for an organization
pub trait ConfigAugmenter: Send + Sync {
    fn augment(&self, config: Value, org_id: &str) -> Value;
}

/// Leaves configs untouched
#[derive(Debug, Clone, Default)]
pub struct NoopAugmenter;

impl ConfigAugmenter for NoopAugmenter {
    fn augment(&self, config: Value, _org_id: &str) -> Value {
        config
    }
}

/// Adds preview taps that post sampled events to `sink_uri`
#[derive(Debug, Clone)]
pub struct PreviewAugmenter {
    sink_uri: String,
}

impl PreviewAugmenter {
    pub fn new(sink_uri: impl Into<String>) -> Self {
        Self {
            sink_uri: sink_uri.into(),
        }
    }

    fn preview_sink(&self) -> Value {
        json!({
            "type": "http",
            "uri": self.sink_uri,
            "method": "post",
            "encoding": { "codec": "json" },
            "compression": "none",
            "batch": { "max_bytes": 1049000, "max_events": 10 },
            "request": { "headers": { "Content-Type": "application/json" } },
            "healthcheck": { "enabled": true },
            "inputs": []
        })
    }
}

impl ConfigAugmenter for PreviewAugmenter {
    fn augment(&self, config: Value, org_id: &str) -> Value {
        let Value::Object(mut root) = config else {
            return config;
        };

        let sources = object_entries(root.get("sources"));
        let sinks = object_entries(root.get("sinks"));

        let mut transforms = match root.remove("transforms") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let mut preview_inputs = Vec::new();

        for (source_id, source) in &sources {
            let input = if source.get("type").and_then(Value::as_str) == Some("opentelemetry") {
                format!("{}.logs", source_id)
            } else {
                source_id.clone()
            };

            let transform_id = format!("{}_preview", source_id);
            transforms.insert(
                transform_id.clone(),
                preview_transform(source_id, "source", org_id, vec![Value::String(input)]),
            );
            preview_inputs.push(Value::String(transform_id));
        }

        for (sink_id, sink) in &sinks {
            if sink_id == PREVIEW_SINK_ID {
                continue;
            }

            let inputs = sink
                .get("inputs")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let transform_id = format!("{}_preview", sink_id);
            transforms.insert(
                transform_id.clone(),
                preview_transform(sink_id, "sink", org_id, inputs),
            );
            preview_inputs.push(Value::String(transform_id));
        }

        let mut preview_sink = self.preview_sink();
        preview_sink["inputs"] = Value::Array(preview_inputs);

        let mut sinks_map = match root.remove("sinks") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        sinks_map.insert(PREVIEW_SINK_ID.to_string(), preview_sink);

        root.insert("transforms".to_string(), Value::Object(transforms));
        root.insert("sinks".to_string(), Value::Object(sinks_map));
        Value::Object(root)
    }
}

fn preview_transform(component_id: &str, component_type: &str, org_id: &str, inputs: Vec<Value>) -> Value {
    let source = format!(
        ".siftdev_preview_component = \"{}\"\n.siftdev_preview_type = \"{}\"\n.siftdev_org_id = \"{}\"\n.timestamp = now()",
        component_id, component_type, org_id
    );

    json!({
        "type": "remap",
        "inputs": inputs,
        "source": source,
    })
}

fn object_entries(value: Option<&Value>) -> Vec<(String, Value)> {
    value
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
