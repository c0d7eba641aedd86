use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Injected mail connection settings. Passed explicitly to whichever
/// transport implementation sits behind the traits below; the core never
/// reads these from process-wide state.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub user: String,
    pub password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub imap_server: String,
    pub imap_port: u16,
}

/// A request to ask a company for the specifications of an upcoming
/// product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecRequest {
    pub company_name: String,
    pub company_email: String,
    pub product_name: String,
}

/// One inbox listing entry, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub sender: String,
    pub title: String,
}

/// Outbound mail boundary. Implementations own the wire protocol.
pub trait MailTransport {
    fn send(&self, to_address: &str, subject: &str, body: &str) -> Result<()>;
}

/// Inbound mail boundary: listing plus exact sender-and-title retrieval.
pub trait Mailbox {
    fn list_inbox(&self) -> Result<Vec<InboxEntry>>;
    fn content_by(&self, sender: &str, title: &str) -> Result<Option<String>>;
}

pub fn request_recipient(request: &SpecRequest) -> String {
    format!("<{}>", request.company_email)
}

pub fn request_subject(request: &SpecRequest) -> String {
    format!("Request for {} Specs", request.product_name)
}

pub fn request_body(request: &SpecRequest, sender_name: &str) -> String {
    format!(
        "Hello {},\n\n\
         We would love to receive detailed specifications for your upcoming product: {}.\n\
         Please let us know as soon as possible.\n\n\
         Best regards,\n{}",
        request.company_name, request.product_name, sender_name
    )
}
