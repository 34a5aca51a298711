/// Invoice routes
///
/// Creation, paginated listing, summary aggregation, PDF download, and
/// logo upload. Every handler runs behind the auth gate and scopes its
/// queries to the authenticated user.

use actix_web::{web, HttpResponse};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::path::Path;
use uuid::Uuid;

use crate::configuration::Settings;
use crate::error::{AppError, DatabaseError, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::pdf::{build_invoice_html, InvoiceDocument, LineItem, PdfClient};

const ALLOWED_STATUSES: [&str; 5] = ["DRAFT", "SENT", "PAID", "OVERDUE", "UNCOLLECTIBLE"];
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_LOGO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: Option<Uuid>,
    pub client: Option<NewClient>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub purchase_order: Option<String>,
    #[serde(default)]
    pub items: Vec<NewInvoiceItem>,
    pub status: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct NewInvoiceItem {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub rate: Option<f64>,
    pub discount: Option<f64>,
}

#[derive(Serialize)]
struct InvoiceItemAmounts {
    position: i32,
    description: String,
    quantity: f64,
    rate: f64,
    discount: f64,
    amount: f64,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub client: Option<String>,
}

#[derive(sqlx::FromRow, Serialize)]
pub struct InvoiceListRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_name: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub total: f64,
    pub amount_due: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Defaults mirror the invoice form: missing description becomes
/// "Service", quantity 1, rate and discount 0. Positions record the
/// submitted order so documents always render items as entered.
fn normalize_items(items: &[NewInvoiceItem]) -> Vec<InvoiceItemAmounts> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let description = item
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or("Service")
                .to_string();
            let quantity = item.quantity.unwrap_or(1.0);
            let rate = item.rate.unwrap_or(0.0);
            let discount = item.discount.unwrap_or(0.0);
            let amount = round2(quantity * rate * (1.0 - discount / 100.0));

            InvoiceItemAmounts {
                position: position as i32,
                description,
                quantity,
                rate,
                discount,
                amount,
            }
        })
        .collect()
}

fn validate_status(status: Option<&str>) -> Result<String, AppError> {
    let status = status.unwrap_or("DRAFT").to_uppercase();
    if !ALLOWED_STATUSES.contains(&status.as_str()) {
        return Err(ValidationError::InvalidFormat(format!(
            "status must be one of {}",
            ALLOWED_STATUSES.join(", ")
        ))
        .into());
    }
    Ok(status)
}

/// Per-user sequence, zero-padded to five digits.
fn format_invoice_number(count: i64) -> String {
    format!("{:05}", count + 1)
}

async fn resolve_client_id(
    pool: &PgPool,
    user_id: Uuid,
    form: &CreateInvoiceRequest,
) -> Result<Uuid, AppError> {
    if let Some(client_id) = form.client_id {
        let owned = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM clients WHERE id = $1 AND user_id = $2",
        )
        .bind(client_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        return owned.map(|(id,)| id).ok_or_else(|| {
            AppError::Validation(ValidationError::InvalidFormat(
                "Unknown client".to_string(),
            ))
        });
    }

    let client = form
        .client
        .as_ref()
        .ok_or(ValidationError::MissingField("client"))?;

    let existing = sqlx::query_as::<_, (Uuid,)>(
        "SELECT id FROM clients WHERE user_id = $1 AND name = $2",
    )
    .bind(user_id)
    .bind(&client.name)
    .fetch_optional(pool)
    .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let client_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO clients (id, user_id, name, email, address, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(client_id)
    .bind(user_id)
    .bind(&client.name)
    .bind(&client.email)
    .bind(&client.address)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(client_id)
}

/// POST /api/invoices
pub async fn create_invoice(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<CreateInvoiceRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.into_inner().0;
    let status = validate_status(form.status.as_deref())?;
    let client_id = resolve_client_id(pool.get_ref(), user_id, &form).await?;

    let items = normalize_items(&form.items);
    let total = round2(items.iter().map(|i| i.amount).sum());
    let amount_due = if status == "PAID" { 0.0 } else { total };

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoices WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool.get_ref())
        .await?;
    let invoice_number = format_invoice_number(count);

    let invoice_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO invoices
            (id, invoice_number, user_id, client_id, issue_date, due_date,
             purchase_order, logo_url, status, total, amount_due, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
        "#,
    )
    .bind(invoice_id)
    .bind(&invoice_number)
    .bind(user_id)
    .bind(client_id)
    .bind(form.issue_date)
    .bind(form.due_date)
    .bind(&form.purchase_order)
    .bind(&form.logo_url)
    .bind(&status)
    .bind(total)
    .bind(amount_due)
    .bind(now)
    .execute(&mut tx)
    .await?;

    for item in &items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (id, invoice_id, position, description, quantity, rate, discount, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(item.position)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.rate)
        .bind(item.discount)
        .bind(item.amount)
        .execute(&mut tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = %user_id, invoice_id = %invoice_id, invoice_number = %invoice_number, "Invoice created");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "invoice": {
            "id": invoice_id,
            "invoice_number": invoice_number,
            "client_id": client_id,
            "issue_date": form.issue_date,
            "due_date": form.due_date,
            "purchase_order": form.purchase_order,
            "logo_url": form.logo_url,
            "status": status,
            "total": total,
            "amount_due": amount_due,
            "items": items
        }
    })))
}

/// GET /api/invoices
///
/// Paginated listing with optional comma-separated status filter and a
/// case-insensitive client name filter, newest issue date first.
pub async fn list_invoices(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<ListQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.into_inner().0;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let statuses: Option<Vec<String>> = query.status.as_deref().map(|s| {
        s.split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| ALLOWED_STATUSES.contains(&s.as_str()))
            .collect()
    });
    let statuses = statuses.filter(|s: &Vec<String>| !s.is_empty());

    let mut list_query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT i.id, i.invoice_number, c.name AS client_name, i.issue_date, i.due_date, \
         i.status, i.total, i.amount_due \
         FROM invoices i JOIN clients c ON c.id = i.client_id WHERE i.user_id = ",
    );
    list_query.push_bind(user_id);

    let mut count_query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT COUNT(*) FROM invoices i JOIN clients c ON c.id = i.client_id WHERE i.user_id = ",
    );
    count_query.push_bind(user_id);

    if let Some(statuses) = &statuses {
        list_query.push(" AND i.status = ANY(");
        list_query.push_bind(statuses.clone());
        list_query.push(")");
        count_query.push(" AND i.status = ANY(");
        count_query.push_bind(statuses.clone());
        count_query.push(")");
    }
    if let Some(client) = &query.client {
        let pattern = format!("%{}%", client);
        list_query.push(" AND c.name ILIKE ");
        list_query.push_bind(pattern.clone());
        count_query.push(" AND c.name ILIKE ");
        count_query.push_bind(pattern);
    }

    list_query.push(" ORDER BY i.issue_date DESC LIMIT ");
    list_query.push_bind(limit);
    list_query.push(" OFFSET ");
    list_query.push_bind(offset);

    let invoices = list_query
        .build_query_as::<InvoiceListRow>()
        .fetch_all(pool.get_ref())
        .await?;

    let (total,) = count_query
        .build_query_as::<(i64,)>()
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": invoices,
        "meta": {
            "total": total,
            "page": page,
            "limit": limit,
            "total_pages": (total + limit - 1) / limit
        }
    })))
}

/// GET /api/invoices/summary
///
/// Four aggregates over the caller's invoices: overdue, outstanding,
/// paid this calendar month, and uncollectible.
pub async fn invoice_summary(
    user: web::ReqData<AuthenticatedUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.into_inner().0;

    let now = Utc::now();
    let month_start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| AppError::Internal("Failed to compute month start".to_string()))?;

    let overdue = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(amount_due), 0) FROM invoices \
         WHERE user_id = $1 AND status = 'OVERDUE' AND amount_due > 0",
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let outstanding = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(amount_due), 0) FROM invoices \
         WHERE user_id = $1 AND status IN ('SENT', 'OVERDUE') AND amount_due > 0",
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let paid_this_month = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(total), 0) FROM invoices \
         WHERE user_id = $1 AND status = 'PAID' AND updated_at >= $2",
    )
    .bind(user_id)
    .bind(month_start)
    .fetch_one(pool.get_ref())
    .await?;

    let uncollectible = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(total), 0) FROM invoices \
         WHERE user_id = $1 AND status = 'UNCOLLECTIBLE'",
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "overdue": overdue,
        "outstanding": outstanding,
        "paid_this_month": paid_this_month,
        "uncollectible": uncollectible
    })))
}

/// GET /api/invoices/{id}/download
pub async fn download_invoice(
    user: web::ReqData<AuthenticatedUser>,
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    pdf_client: web::Data<PdfClient>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.into_inner().0;
    let invoice_id = path.into_inner();

    let invoice = sqlx::query_as::<_, (String, NaiveDate, NaiveDate, f64, Option<String>, String, Option<String>)>(
        r#"
        SELECT i.invoice_number, i.issue_date, i.due_date, i.total, i.logo_url,
               c.name, c.email
        FROM invoices i
        JOIN clients c ON c.id = i.client_id
        WHERE i.id = $1 AND i.user_id = $2
        "#,
    )
    .bind(invoice_id)
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("Invoice not found".to_string())))?;

    let (invoice_number, issue_date, due_date, total, logo_url, client_name, client_email) =
        invoice;

    let (name, company_name, email) = sqlx::query_as::<_, (String, String, String)>(
        "SELECT name, company_name, email FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let items = sqlx::query_as::<_, (String, f64, f64, f64)>(
        "SELECT description, quantity, rate, amount FROM invoice_items \
         WHERE invoice_id = $1 ORDER BY position",
    )
    .bind(invoice_id)
    .fetch_all(pool.get_ref())
    .await?;

    let document = InvoiceDocument {
        business_name: if company_name.is_empty() { name } else { company_name },
        business_email: email,
        client_name,
        client_email: client_email.unwrap_or_default(),
        invoice_number: invoice_number.clone(),
        issue_date,
        due_date,
        total,
        logo_url,
        items: items
            .into_iter()
            .map(|(description, quantity, rate, amount)| LineItem {
                description,
                quantity,
                rate,
                amount,
            })
            .collect(),
    };

    let html = build_invoice_html(&document, &settings.uploads.dir);
    let pdf = pdf_client.render(html).await?;

    tracing::info!(user_id = %user_id, invoice_id = %invoice_id, "Invoice PDF generated");

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"invoice-{}.pdf\"", invoice_number),
        ))
        .body(pdf))
}

/// PNG or JPEG by magic bytes; the extension on the upload is ignored.
fn detect_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else {
        None
    }
}

/// POST /api/invoices/upload-logo
pub async fn upload_logo(
    user: web::ReqData<AuthenticatedUser>,
    body: web::Bytes,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.into_inner().0;

    if body.is_empty() {
        return Err(ValidationError::MissingField("file").into());
    }
    if body.len() > MAX_LOGO_BYTES {
        return Err(ValidationError::InvalidFormat(
            "File exceeds the 10MB limit".to_string(),
        )
        .into());
    }

    let ext = detect_image(&body).ok_or_else(|| {
        AppError::Validation(ValidationError::InvalidFormat(
            "Invalid file content. Only real PNG/JPEG images allowed.".to_string(),
        ))
    })?;

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    let file_path = Path::new(&settings.uploads.dir).join(&file_name);

    let bytes = body.to_vec();
    web::block(move || std::fs::write(&file_path, &bytes))
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to store logo: {}", e)))?;

    tracing::info!(user_id = %user_id, file_name = %file_name, "Logo uploaded");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "logo_url": format!("/uploads/{}", file_name)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.346), 10.35);
        assert_eq!(round2(10.344), 10.34);
        assert_eq!(round2(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_item_amount_with_discount() {
        let items = normalize_items(&[NewInvoiceItem {
            description: Some("Design work".to_string()),
            quantity: Some(4.0),
            rate: Some(50.0),
            discount: Some(10.0),
        }]);

        assert_eq!(items[0].amount, 180.0);
    }

    #[test]
    fn test_item_defaults() {
        let items = normalize_items(&[NewInvoiceItem {
            description: Some("   ".to_string()),
            quantity: None,
            rate: None,
            discount: None,
        }]);

        assert_eq!(items[0].description, "Service");
        assert_eq!(items[0].quantity, 1.0);
        assert_eq!(items[0].rate, 0.0);
        assert_eq!(items[0].amount, 0.0);
    }

    #[test]
    fn test_items_keep_submitted_order() {
        let items = normalize_items(&[
            NewInvoiceItem {
                description: Some("Discovery".to_string()),
                quantity: Some(1.0),
                rate: Some(500.0),
                discount: None,
            },
            NewInvoiceItem {
                description: Some("Build".to_string()),
                quantity: Some(10.0),
                rate: Some(120.0),
                discount: None,
            },
            NewInvoiceItem {
                description: Some("Handover".to_string()),
                quantity: Some(2.0),
                rate: Some(80.0),
                discount: None,
            },
        ]);

        let positions: Vec<i32> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(items[1].description, "Build");
    }

    #[test]
    fn test_status_validation() {
        assert_eq!(validate_status(None).unwrap(), "DRAFT");
        assert_eq!(validate_status(Some("paid")).unwrap(), "PAID");
        assert!(validate_status(Some("BOGUS")).is_err());
    }

    #[test]
    fn test_invoice_number_is_zero_padded() {
        assert_eq!(format_invoice_number(0), "00001");
        assert_eq!(format_invoice_number(41), "00042");
        assert_eq!(format_invoice_number(99999), "100000");
    }

    #[test]
    fn test_detect_image_magic_bytes() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        let jpg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        let gif = b"GIF89a";

        assert_eq!(detect_image(&png), Some("png"));
        assert_eq!(detect_image(&jpg), Some("jpg"));
        assert_eq!(detect_image(gif), None);
    }
}
