//! Sends a single invocation message to a resolved instance route, per the
//! Function's declared `Invocation.Format`.

use crate::core::error::FuncError;
use crate::core::function::InvocationFormat;
use serde::Serialize;

/// A single invocation payload, independent of wire format.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub id: String,
    pub source: String,
    pub kind: String,
    pub data: String,
}

#[derive(Serialize)]
struct CloudEventEnvelope<'a> {
    #[serde(rename = "specversion")]
    spec_version: &'static str,
    id: &'a str,
    source: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    datacontenttype: &'static str,
    data: &'a str,
}

/// Sends `message` to `route` using `format`. `http` posts a form with fields
/// `ID, Source, Type, Data`; `cloudevent` posts a JSON-shaped CloudEvent envelope.
/// Any non-2xx response, or a transport failure, is a `FuncError::Transport` naming
/// `route`.
pub fn invoke(
    client: &reqwest::blocking::Client,
    route: &str,
    format: InvocationFormat,
    message: &Message,
) -> Result<(), FuncError> {
    let response = match format {
        InvocationFormat::Http => client
            .post(route)
            .form(&[
                ("ID", message.id.as_str()),
                ("Source", message.source.as_str()),
                ("Type", message.kind.as_str()),
                ("Data", message.data.as_str()),
            ])
            .send(),
        InvocationFormat::CloudEvent => {
            let envelope = CloudEventEnvelope {
                spec_version: "1.0",
                id: &message.id,
                source: &message.source,
                kind: &message.kind,
                datacontenttype: "text/plain",
                data: &message.data,
            };
            client.post(route).json(&envelope).send()
        }
    }
    .map_err(|e| FuncError::transport(route.to_string(), e))?;

    if !response.status().is_success() {
        return Err(FuncError::Transport {
            context: route.to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("invoke {route} failed: HTTP {}", response.status()),
            )),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_event_envelope_serializes_required_attributes() {
        let envelope = CloudEventEnvelope {
            spec_version: "1.0",
            id: "1",
            source: "/src",
            kind: "t",
            datacontenttype: "text/plain",
            data: "hi",
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["source"], "/src");
        assert_eq!(json["type"], "t");
        assert_eq!(json["data"], "hi");
    }
}
