/// Invoice PDF export
///
/// The core builds the invoice HTML and hands it to an external
/// HTML-to-PDF render service; nothing here knows how the rendering
/// actually happens. An uploaded logo is inlined as a data URI when the
/// file still exists, otherwise the business name is used as a heading.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

use crate::error::AppError;

const INVOICE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><style>
  body { font-family: sans-serif; color: #111827; margin: 40px; }
  table { width: 100%; border-collapse: collapse; margin-top: 24px; }
  th, td { text-align: left; padding: 8px 4px; border-bottom: 1px solid #e5e7eb; }
  .meta { color: #6b7280; }
  .total { font-size: 20px; font-weight: bold; text-align: right; margin-top: 16px; }
</style></head>
<body>
  <!--LOGO-->
  <p class="meta"><!--BUSINESS--> &middot; <!--EMAIL--></p>
  <h2>Invoice #<!--NUMBER--></h2>
  <p class="meta">Billed to: <!--CLIENT_NAME--> &lt;<!--CLIENT_EMAIL-->&gt;</p>
  <p class="meta">Issued: <!--DATE--> &middot; Due: <!--DUE--></p>
  <table>
    <tr><th>Description</th><th>Qty</th><th>Rate</th><th>Amount</th></tr>
    <!--ITEMS-->
  </table>
  <p class="total">Total: <!--TOTAL--></p>
</body>
</html>"#;

/// Everything the renderer needs about one invoice.
pub struct InvoiceDocument {
    pub business_name: String,
    pub business_email: String,
    pub client_name: String,
    pub client_email: String,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total: f64,
    pub logo_url: Option<String>,
    pub items: Vec<LineItem>,
}

pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn logo_html(doc: &InvoiceDocument, uploads_dir: &str) -> String {
    if let Some(logo_url) = &doc.logo_url {
        // Only the file name is trusted; the URL path itself is client data.
        if let Some(file_name) = Path::new(logo_url).file_name() {
            let logo_path = Path::new(uploads_dir).join(file_name);
            if let Ok(bytes) = std::fs::read(&logo_path) {
                let mime = if logo_url.ends_with(".png") {
                    "image/png"
                } else {
                    "image/jpeg"
                };
                return format!(
                    r#"<img src="data:{};base64,{}" style="max-height: 90px; max-width: 200px; object-fit: contain;" />"#,
                    mime,
                    BASE64.encode(&bytes)
                );
            }
        }
    }

    format!(
        r#"<h1 style="font-size: 28px; color: #6366f1; margin: 0;">{}</h1>"#,
        escape(&doc.business_name)
    )
}

/// Fill the invoice template for one document.
pub fn build_invoice_html(doc: &InvoiceDocument, uploads_dir: &str) -> String {
    let mut item_rows = String::new();
    for item in &doc.items {
        item_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td></tr>\n",
            escape(&item.description),
            item.quantity,
            item.rate,
            item.amount
        ));
    }

    INVOICE_TEMPLATE
        .replace("<!--LOGO-->", &logo_html(doc, uploads_dir))
        .replace("<!--BUSINESS-->", &escape(&doc.business_name))
        .replace("<!--EMAIL-->", &escape(&doc.business_email))
        .replace("<!--CLIENT_NAME-->", &escape(&doc.client_name))
        .replace("<!--CLIENT_EMAIL-->", &escape(&doc.client_email))
        .replace("<!--NUMBER-->", &escape(&doc.invoice_number))
        .replace("<!--DATE-->", &doc.issue_date.format("%Y-%m-%d").to_string())
        .replace("<!--DUE-->", &doc.due_date.format("%Y-%m-%d").to_string())
        .replace("<!--ITEMS-->", &item_rows)
        .replace("<!--TOTAL-->", &format!("{:.2}", doc.total))
}

#[derive(Clone)]
pub struct PdfClient {
    http_client: reqwest::Client,
    render_url: String,
}

#[derive(Serialize)]
struct RenderRequest {
    html: String,
}

impl PdfClient {
    pub fn new(render_url: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            render_url,
        }
    }

    /// Hand the HTML to the render service and return the PDF bytes.
    pub async fn render(&self, html: String) -> Result<Vec<u8>, AppError> {
        let response = self
            .http_client
            .post(&self.render_url)
            .json(&RenderRequest { html })
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach PDF render service: {}", e);
                AppError::Render(format!("Render service unreachable: {}", e))
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("PDF render service returned error: {}", e);
                AppError::Render(format!("Render service error: {}", e))
            })?;

        let bytes = response.bytes().await.map_err(|e| {
            AppError::Render(format!("Failed to read rendered document: {}", e))
        })?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> InvoiceDocument {
        InvoiceDocument {
            business_name: "Acme".to_string(),
            business_email: "billing@acme.test".to_string(),
            client_name: "Globex".to_string(),
            client_email: "ap@globex.test".to_string(),
            invoice_number: "00042".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            total: 1250.5,
            logo_url: None,
            items: vec![LineItem {
                description: "Consulting".to_string(),
                quantity: 10.0,
                rate: 125.05,
                amount: 1250.5,
            }],
        }
    }

    #[test]
    fn test_html_contains_invoice_fields() {
        let html = build_invoice_html(&sample_document(), "uploads");

        assert!(html.contains("Invoice #00042"));
        assert!(html.contains("Globex"));
        assert!(html.contains("Consulting"));
        assert!(html.contains("1250.50"));
        assert!(html.contains("2026-03-01"));
    }

    #[test]
    fn test_missing_logo_falls_back_to_business_name() {
        let mut doc = sample_document();
        doc.logo_url = Some("/uploads/does-not-exist.png".to_string());

        let html = build_invoice_html(&doc, "uploads");
        assert!(html.contains("<h1"));
        assert!(!html.contains("data:image"));
    }

    #[test]
    fn test_text_fields_are_escaped() {
        let mut doc = sample_document();
        doc.client_name = "<script>alert(1)</script>".to_string();

        let html = build_invoice_html(&doc, "uploads");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
