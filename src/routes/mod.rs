mod auth;
mod health_check;
mod invoices;

pub use auth::{login, logout, refresh_token, register, resend_verification, verify_email};
pub use health_check::health_check;
pub use invoices::{
    create_invoice, download_invoice, invoice_summary, list_invoices, upload_logo,
};
