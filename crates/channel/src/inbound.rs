//! Provider webhook payload → pipeline job payload mapping. The webhook
//! controller itself (routing, signature verification, tenant resolution
//! from the provider's phone-number id) lives outside this crate; what is
//! preserved here is the shape of the provider envelope and the mapping into
//! the one payload the pipeline understands.

use serde::Deserialize;

use pedibot_core::domain::product::TenantId;

use crate::ChannelError;

/// The payload the channel adapter enqueues, one per inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub tenant_id: TenantId,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub text: String,
    pub media_ref: Option<String>,
}

/// WhatsApp-style webhook envelope, reduced to the fields the mapping reads.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: WebhookValue,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: String,
    pub profile: Option<WebhookProfile>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookProfile {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    pub text: Option<WebhookText>,
    pub image: Option<WebhookMedia>,
    pub audio: Option<WebhookMedia>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookText {
    #[serde(default)]
    pub body: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookMedia {
    #[serde(default)]
    pub id: String,
    pub caption: Option<String>,
}

/// Flattens a webhook envelope into inbound messages for one tenant (the
/// caller already resolved which tenant the webhook belongs to). Messages
/// carrying neither text nor media are dropped with an error so the caller
/// can log them.
pub fn map_webhook(
    tenant_id: &TenantId,
    envelope: &WebhookEnvelope,
) -> Result<Vec<InboundMessage>, ChannelError> {
    let mut inbound = Vec::new();

    for entry in &envelope.entry {
        for change in &entry.changes {
            for message in &change.value.messages {
                inbound.push(map_message(tenant_id, &change.value.contacts, message)?);
            }
        }
    }

    Ok(inbound)
}

fn map_message(
    tenant_id: &TenantId,
    contacts: &[WebhookContact],
    message: &WebhookMessage,
) -> Result<InboundMessage, ChannelError> {
    if message.from.trim().is_empty() {
        return Err(ChannelError::MalformedPayload("message has no sender".to_string()));
    }

    let customer_name = contacts
        .iter()
        .find(|contact| contact.wa_id == message.from)
        .and_then(|contact| contact.profile.as_ref())
        .map(|profile| profile.name.trim().to_string())
        .filter(|name| !name.is_empty());

    let text = message.text.as_ref().map(|text| text.body.trim().to_string()).unwrap_or_default();
    let media = message.image.as_ref().or(message.audio.as_ref());
    let caption = media
        .and_then(|media| media.caption.as_ref())
        .map(|caption| caption.trim().to_string())
        .unwrap_or_default();
    let media_ref = media.map(|media| media.id.clone()).filter(|id| !id.is_empty());

    let body = if !text.is_empty() { text } else { caption };
    if body.is_empty() && media_ref.is_none() {
        return Err(ChannelError::MalformedPayload(format!(
            "message of type `{}` carries neither text nor media",
            message.kind
        )));
    }

    Ok(InboundMessage {
        tenant_id: tenant_id.clone(),
        customer_phone: message.from.clone(),
        customer_name,
        text: body,
        media_ref,
    })
}

#[cfg(test)]
mod tests {
    use pedibot_core::domain::product::TenantId;

    use super::{map_webhook, WebhookEnvelope};
    use crate::ChannelError;

    fn tenant() -> TenantId {
        TenantId("tenant-1".to_string())
    }

    fn parse_envelope(raw: &str) -> WebhookEnvelope {
        serde_json::from_str(raw).expect("valid envelope json")
    }

    #[test]
    fn text_message_maps_to_inbound_payload() {
        let envelope = parse_envelope(
            r#"{"entry":[{"changes":[{"value":{
                "contacts":[{"wa_id":"5215512345678","profile":{"name":"Ana López"}}],
                "messages":[
                    {"from":"5215512345678","type":"text","text":{"body":"quiero 2 pizzas"}}
                ]}}]}]}"#,
        );

        let inbound = map_webhook(&tenant(), &envelope).expect("map webhook");
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].customer_phone, "5215512345678");
        assert_eq!(inbound[0].customer_name.as_deref(), Some("Ana López"));
        assert_eq!(inbound[0].text, "quiero 2 pizzas");
        assert_eq!(inbound[0].media_ref, None);
    }

    #[test]
    fn missing_contact_profile_leaves_name_unset() {
        let envelope = parse_envelope(
            r#"{"entry":[{"changes":[{"value":{"messages":[
                {"from":"5215512345678","type":"text","text":{"body":"hola"}}
            ]}}]}]}"#,
        );

        let inbound = map_webhook(&tenant(), &envelope).expect("map webhook");
        assert_eq!(inbound[0].customer_name, None);
    }

    #[test]
    fn image_with_caption_keeps_caption_and_media_ref() {
        let envelope = parse_envelope(
            r#"{"entry":[{"changes":[{"value":{"messages":[
                {"from":"5215512345678","type":"image","image":{"id":"media-9","caption":"¿tienen de estas?"}}
            ]}}]}]}"#,
        );

        let inbound = map_webhook(&tenant(), &envelope).expect("map webhook");
        assert_eq!(inbound[0].text, "¿tienen de estas?");
        assert_eq!(inbound[0].media_ref.as_deref(), Some("media-9"));
    }

    #[test]
    fn empty_message_is_rejected() {
        let envelope = parse_envelope(
            r#"{"entry":[{"changes":[{"value":{"messages":[
                {"from":"5215512345678","type":"sticker"}
            ]}}]}]}"#,
        );

        let error = map_webhook(&tenant(), &envelope).expect_err("should reject");
        assert!(matches!(error, ChannelError::MalformedPayload(_)));
    }

    #[test]
    fn envelope_without_messages_maps_to_nothing() {
        let envelope = parse_envelope(r#"{"entry":[{"changes":[{"value":{}}]}]}"#);
        let inbound = map_webhook(&tenant(), &envelope).expect("map webhook");
        assert!(inbound.is_empty());
    }
}
