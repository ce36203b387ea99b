use serde::Serialize;
use std::sync::OnceLock;

pub const WIDGET_SCRIPT_SRC: &str = "https://widget.kommunicate.io/v2/kommunicate.app";

/// Everything the page needs to inject the chat widget script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDescriptor {
    pub script_src: String,
    pub app_id: String,
    pub popup_widget: bool,
    pub automatic_chat_open_on_navigation: bool,
}

/// Builds the chat widget descriptor at most once per process, however many
/// times it is requested. No app id means no widget.
#[derive(Debug)]
pub struct WidgetLoader {
    app_id: Option<String>,
    loaded: OnceLock<Option<WidgetDescriptor>>,
}

impl WidgetLoader {
    pub fn new(app_id: Option<String>) -> Self {
        Self {
            app_id,
            loaded: OnceLock::new(),
        }
    }

    pub fn load(&self) -> Option<&WidgetDescriptor> {
        self.loaded
            .get_or_init(|| match &self.app_id {
                Some(app_id) => {
                    tracing::info!(app_id = %app_id, "Chat widget loaded");
                    Some(WidgetDescriptor {
                        script_src: WIDGET_SCRIPT_SRC.to_string(),
                        app_id: app_id.clone(),
                        popup_widget: true,
                        automatic_chat_open_on_navigation: true,
                    })
                }
                None => {
                    tracing::info!("CHATBOT_APP_ID not set, chat widget disabled");
                    None
                }
            })
            .as_ref()
    }
}
