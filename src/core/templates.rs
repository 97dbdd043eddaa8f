//! Customer-facing message templates.

use crate::infrastructure::orders::OrderStatus;
use log::error;
use minijinja::{Environment, context};
use std::sync::OnceLock;

const ORDER_STATUS: &str = "order_status";
const APPOINTMENT_CONFIRMED: &str = "appointment_confirmed";

const TEMPLATES: [(&str, &str); 2] = [
    (
        ORDER_STATUS,
        r#"Pedido #{{ reference }}: {{ status }}.
{% if total %}
Total: {{ total }}{% if currency %} {{ currency }}{% endif %}.
{% endif %}
{% if date_created %}
Fecha: {{ date_created }}.
{% endif %}
{% if tracking_number %}
Número de seguimiento: {{ tracking_number }}.
{% endif %}"#,
    ),
    (
        APPOINTMENT_CONFIRMED,
        r#"Hola {{ customer_name }}, tu cita en {{ workshop_name }} para el {{ date }} a las {{ time }} ha sido confirmada.{% if address %} Te esperamos en {{ address }}.{% endif %}"#,
    ),
];

static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    ENVIRONMENT.get_or_init(|| {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        for (name, source) in TEMPLATES {
            if let Err(e) = env.add_template(name, source) {
                error!("template `{name}` does not compile: {e}");
            }
        }
        env
    })
}

fn render(name: &str, ctx: minijinja::Value) -> Result<String, minijinja::Error> {
    let rendered = environment().get_template(name)?.render(ctx)?;
    Ok(rendered.trim().to_owned())
}

fn order_status_label(status: &str) -> &str {
    match status {
        "pending" => "pendiente de pago",
        "processing" => "en preparación",
        "on-hold" => "en espera",
        "completed" => "completado",
        "shipped" => "enviado",
        "cancelled" => "cancelado",
        "refunded" => "reembolsado",
        "failed" => "fallido",
        other => other,
    }
}

pub fn order_status_summary(order: &OrderStatus) -> String {
    let reference = order.number.clone().unwrap_or_else(|| match &order.id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    let ctx = context! {
        reference => reference.as_str(),
        status => order_status_label(&order.status),
        total => order.total.as_deref(),
        currency => order.currency.as_deref(),
        date_created => order.date_created.as_deref(),
        tracking_number => order.tracking_number.as_deref(),
    };

    render(ORDER_STATUS, ctx).unwrap_or_else(|e| {
        error!("failed to render order status: {e}");
        format!("Pedido #{reference}: {}.", order_status_label(&order.status))
    })
}

pub struct ConfirmationDetails<'a> {
    pub customer_name: &'a str,
    pub workshop_name: &'a str,
    pub address: &'a str,
    pub date: String,
    pub time: String,
}

pub fn appointment_confirmation(details: &ConfirmationDetails<'_>) -> String {
    let ctx = context! {
        customer_name => details.customer_name,
        workshop_name => details.workshop_name,
        address => details.address,
        date => details.date.as_str(),
        time => details.time.as_str(),
    };

    render(APPOINTMENT_CONFIRMED, ctx).unwrap_or_else(|e| {
        error!("failed to render appointment confirmation: {e}");
        format!(
            "Tu cita en {} para el {} a las {} ha sido confirmada.",
            details.workshop_name, details.date, details.time
        )
    })
}
