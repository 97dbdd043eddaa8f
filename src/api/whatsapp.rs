//! Messaging provider webhook

use crate::api::whatsapp::schemas::WebhookForm;
use crate::core::traits::ConversationRouter;
use axum::Form;
use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use di_axum::Inject;
use log::{error, info, warn};

/// The provider only needs an acknowledgement; replies are sent through its REST API.
pub const EMPTY_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

pub fn router() -> Router {
    Router::new().route("/whatsapp", post(inbound_message))
}

fn empty_response() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/xml")], EMPTY_RESPONSE)
}

async fn inbound_message(
    Inject(router): Inject<dyn ConversationRouter>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> impl IntoResponse {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!("ignoring malformed webhook payload: {rejection}");
            return empty_response();
        }
    };

    let inbound = form.into_inbound();
    let user_id = inbound.user_id().to_owned();

    match router.handle_inbound(inbound).await {
        Ok(outcome) => info!("inbound message from {user_id}: {outcome:?}"),
        Err(e) => error!("failed to process inbound message from {user_id}: {e}"),
    }

    empty_response()
}

pub mod schemas {
    use crate::core::router::InboundMessage;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "PascalCase")]
    pub struct WebhookForm {
        #[serde(default)]
        pub from: String,
        #[serde(default)]
        pub body: String,
        #[serde(default)]
        pub num_media: Option<String>,
        #[serde(default)]
        pub media_url0: Option<String>,
        #[serde(default)]
        pub media_content_type0: Option<String>,
        #[serde(default)]
        pub profile_name: Option<String>,
    }

    impl WebhookForm {
        pub fn into_inbound(self) -> InboundMessage {
            InboundMessage {
                num_media: self
                    .num_media
                    .as_deref()
                    .and_then(|n| n.trim().parse().ok())
                    .unwrap_or(0),
                from: self.from,
                body: self.body,
                media_url: self.media_url0.filter(|url| !url.is_empty()),
                media_content_type: self.media_content_type0.filter(|t| !t.is_empty()),
                profile_name: self.profile_name.filter(|name| !name.is_empty()),
            }
        }
    }
}
