use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::config::FieldConfig;
use crate::server::MetadataState;

/// Key the form stamps on every submission; clients may not set it.
const TIMESTAMP_KEY: &str = "_timestamp";

const SUBMIT_SCRIPT: &str = r#"
document.getElementById('metadata').addEventListener('submit', async (event) => {
    event.preventDefault();
    const data = Object.fromEntries(new FormData(event.target));
    const status = document.getElementById('status');
    const response = await fetch('submit', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(data),
    });
    status.textContent = response.ok ? 'Sent' : await response.text();
});
"#;

pub async fn metadata_form(State(state): State<MetadataState>) -> Html<String> {
    Html(render_form(&state.fields).into_string())
}

/// Stamp a JSON object with the current UTC time and queue it for the node.
pub async fn submit_metadata(
    State(state): State<MetadataState>,
    Json(mut data): Json<Map<String, Value>>,
) -> Response {
    if data.contains_key(TIMESTAMP_KEY) {
        return (
            StatusCode::BAD_REQUEST,
            format!("{} is a reserved metadata", TIMESTAMP_KEY),
        )
            .into_response();
    }
    data.insert(
        TIMESTAMP_KEY.to_string(),
        Value::String(Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    );
    info!(metadata = %serde_json::Value::Object(data.clone()), "metadata submitted");

    match state.queue.try_send(data) {
        Ok(()) => Html(render_form(&state.fields).into_string()).into_response(),
        Err(e) => {
            let reason = match e {
                TrySendError::Full(_) => "full",
                TrySendError::Closed(_) => "closed",
            };
            warn!(reason, "metadata queue unavailable, rejecting submission");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Could not handle the metadata changes",
            )
                .into_response()
        }
    }
}

fn render_form(fields: &BTreeMap<String, FieldConfig>) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                title { "Metadata" }
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
            }
            body {
                form id="metadata" {
                    @for (name, field) in fields {
                        p {
                            label for=(name) { (name) }
                            input
                                id=(name)
                                name=(name)
                                type=(field.input_type())
                                placeholder=(field.placeholder_for(name))
                                value=[field.default.as_deref()];
                        }
                    }
                    button type="submit" { "Send" }
                }
                p id="status" {}
                script { (PreEscaped(SUBMIT_SCRIPT)) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_lists_fields() {
        let fields = BTreeMap::from([
            (
                "email".to_string(),
                FieldConfig {
                    kind: Some("email".into()),
                    placeholder: None,
                    default: Some("hello@example.com".into()),
                },
            ),
            ("name".to_string(), FieldConfig::default()),
        ]);
        let page = render_form(&fields).into_string();
        assert!(page.contains(r#"name="email""#));
        assert!(page.contains(r#"type="email""#));
        assert!(page.contains(r#"value="hello@example.com""#));
        assert!(page.contains(r#"placeholder="name value""#));
    }
}
