//! Message dispatch - routes decoded client envelopes to the hub.
//!
//! Nothing here returns an error to the caller: malformed input is logged,
//! counted and dropped.

use tracing::{debug, warn};

use super::broadcast::Target;
use super::hub::StreamHub;
use super::protocol::{ClientCommand, RawEnvelope, ServerCommand};

/// Handle one text frame from a registered client.
pub fn dispatch_client_text(hub: &mut StreamHub, client_id: &str, text: &str) {
    hub.metrics().envelope_received();

    let envelope = match RawEnvelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(client_id = %client_id, error = %e, "dropping malformed envelope");
            hub.metrics().envelope_malformed();
            return;
        }
    };

    // The ack goes out before the command runs, whatever the command is.
    if let Some(ack) = envelope.ack().cloned() {
        hub.send(ServerCommand::Ack, &ack, Target::Client(client_id.to_string()));
    }

    match envelope.into_command() {
        Ok(ClientCommand::Subscribe(topic)) => {
            hub.subscribe(client_id, &topic);
        }
        Ok(ClientCommand::Unsubscribe(topic)) => {
            hub.unsubscribe(client_id, &topic);
        }
        Ok(ClientCommand::Publish(publish)) => {
            hub.publish(&publish);
            let topic = publish.name.clone();
            hub.send(ServerCommand::Stream, &publish.raw, Target::Topic(topic));
        }
        Ok(ClientCommand::Sync) => {
            debug!(client_id = %client_id, "sync is a no-op");
        }
        Ok(ClientCommand::Unknown(command)) => {
            warn!(client_id = %client_id, command = %command, "ignoring unknown command");
        }
        Err(e) => {
            warn!(client_id = %client_id, error = %e, "dropping invalid payload");
            hub.metrics().envelope_malformed();
        }
    }
}
