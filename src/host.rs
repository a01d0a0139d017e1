use anyhow::Context;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::settings;

/// Which surfaces a title or image update applies to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    #[default]
    Both,
    Hardware,
    Software,
}

impl Target {
    pub fn code(self) -> u8 {
        match self {
            Target::Both => 0,
            Target::Hardware => 1,
            Target::Software => 2,
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Outbound calls into the deck software. Calls for a context the host no
/// longer knows are expected to be ignored by the host.
pub trait Host: Send + Sync + 'static {
    fn set_title(&self, context: &str, title: &str, target: Target);
    fn set_image(&self, context: &str, image: &str, target: Target);
    fn log_message(&self, message: &str);
}

/// Inbound lifecycle events, decoded from the deck software's JSON messages.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    WillAppear { context: String, settings: Value },
    WillDisappear { context: String },
    DidReceiveSettings { context: String, settings: Value },
    TitleParametersDidChange { context: String, font_size: u32 },
    KeyDown { context: String },
    KeyUp { context: String },
    DeviceDidConnect { device: String },
    DeviceDidDisconnect { device: String },
    SendToPlugin { context: String },
    Unknown { event: String },
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    event: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    device: String,
    #[serde(default)]
    payload: Value,
}

impl HostEvent {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let message: InboundMessage =
            serde_json::from_str(raw).context("Failed to parse host message")?;
        Ok(Self::from_message(message))
    }

    fn from_message(message: InboundMessage) -> Self {
        let InboundMessage {
            event,
            context,
            device,
            payload,
        } = message;

        match event.as_str() {
            "willAppear" => HostEvent::WillAppear {
                context,
                settings: settings::settings_object(&payload),
            },
            "willDisappear" => HostEvent::WillDisappear { context },
            "didReceiveSettings" => HostEvent::DidReceiveSettings {
                context,
                settings: settings::settings_object(&payload),
            },
            "titleParametersDidChange" => HostEvent::TitleParametersDidChange {
                context,
                font_size: settings::font_size(&payload),
            },
            "keyDown" => HostEvent::KeyDown { context },
            "keyUp" => HostEvent::KeyUp { context },
            "deviceDidConnect" => HostEvent::DeviceDidConnect { device },
            "deviceDidDisconnect" => HostEvent::DeviceDidDisconnect { device },
            "sendToPlugin" => HostEvent::SendToPlugin { context },
            _ => HostEvent::Unknown { event },
        }
    }
}

#[derive(Serialize)]
struct Outbound<'a, P> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    payload: P,
}

#[derive(Serialize)]
struct TitlePayload<'a> {
    title: &'a str,
    target: Target,
}

#[derive(Serialize)]
struct ImagePayload<'a> {
    // Omitting the image restores the action's default icon.
    #[serde(skip_serializing_if = "str::is_empty")]
    image: &'a str,
    target: Target,
}

#[derive(Serialize)]
struct LogPayload<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    event: &'a str,
    uuid: &'a str,
}

/// A [`Host`] that encodes every outbound call as the deck software's JSON
/// message and hands the text to `send`, typically a socket writer.
pub struct JsonHost<F> {
    send: F,
}

impl<F> JsonHost<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    pub fn new(send: F) -> Self {
        Self { send }
    }

    fn emit<P: Serialize>(&self, event: &str, context: Option<&str>, payload: P) {
        let message = Outbound {
            event,
            context,
            payload,
        };
        if let Ok(json) = serde_json::to_string(&message) {
            (self.send)(json);
        }
    }
}

/// The message a plugin sends first to identify itself.
pub fn registration_message(register_event: &str, plugin_uuid: &str) -> anyhow::Result<String> {
    serde_json::to_string(&Registration {
        event: register_event,
        uuid: plugin_uuid,
    })
    .context("Failed to encode registration message")
}

impl<F> Host for JsonHost<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    fn set_title(&self, context: &str, title: &str, target: Target) {
        self.emit("setTitle", Some(context), TitlePayload { title, target });
    }

    fn set_image(&self, context: &str, image: &str, target: Target) {
        self.emit("setImage", Some(context), ImagePayload { image, target });
    }

    fn log_message(&self, message: &str) {
        self.emit("logMessage", None, LogPayload { message });
    }
}
