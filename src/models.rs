use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Database Models ============

/// A customer move request: two addresses, optional room photos, and the
/// AI-derived estimate fields once analysis has run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quote {
    /// Unique identifier for the quote.
    pub id: Uuid,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Free-text starting address (used for postcode routing).
    pub start_address: String,
    /// Free-text destination address.
    pub end_address: String,
    /// Uploaded room photo URLs, if any.
    pub photo_urls: Option<Vec<String>>,
    /// Quote status ("new", "booked", "completed", "cancelled").
    pub status: String,
    /// Owning user (profile id).
    pub user_id: Uuid,
    /// Whether the customer said they want to book (null until asked).
    pub booking_interest: Option<bool>,
    /// AI price estimate in GBP.
    pub ai_estimate: Option<f64>,
    /// AI total volume estimate in cubic metres.
    pub ai_volume_m3: Option<f64>,
    /// Recommended number of vans.
    pub ai_van_count: Option<i32>,
    /// Driving distance between the two addresses in miles.
    pub ai_distance_miles: Option<f64>,
    /// Recommended number of movers.
    pub ai_recommended_movers: Option<i32>,
}

/// A customer profile, created at signup. Read-only in this service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    /// Matches the auth provider's user id.
    pub id: Uuid,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// A partner removal company buying leads from a prepaid wallet.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PartnerCompany {
    /// Unique identifier for the company.
    pub id: Uuid,
    /// Company display name.
    pub name: String,
    /// Whether the company currently receives leads.
    pub active: bool,
    /// Prepaid wallet balance in pence. Mutated only by top-up credits
    /// and lead-charge debits.
    pub balance_pence: i64,
    /// Postcode area codes the company covers (e.g. ["SW", "NW", "E"]).
    pub coverage_prefixes: Vec<String>,
    /// Payment gateway customer reference.
    pub payment_customer_id: Option<String>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger row describing a single wallet balance change.
///
/// Invariant: a company's `balance_pence` equals the signed sum of its
/// ledger rows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    /// Company whose balance changed.
    pub company_id: Uuid,
    /// Signed amount in pence: positive for top-ups, negative for charges.
    pub amount_pence: i64,
    /// "top_up" or "lead_purchase".
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Quote the charge relates to, for lead purchases.
    pub quote_id: Option<Uuid>,
    /// Gateway checkout session id, for top-ups.
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Record of a lead sold to one company, with a denormalized snapshot of
/// the customer and move details at time of purchase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadPurchase {
    pub id: Uuid,
    pub company_id: Uuid,
    pub quote_id: Uuid,
    /// Fee charged in pence.
    pub amount_pence: i64,
    /// Snapshot: customer name at time of purchase.
    pub customer_name: Option<String>,
    /// Snapshot: customer email at time of purchase.
    pub customer_email: Option<String>,
    /// Snapshot: starting address.
    pub start_address: String,
    /// Snapshot: destination address.
    pub end_address: String,
    /// Snapshot: AI estimate if analysis had run.
    pub ai_estimate: Option<f64>,
    /// Snapshot: AI volume estimate if analysis had run.
    pub ai_volume_m3: Option<f64>,
    /// Purchase status ("new" on creation).
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Pricing record; the most recent active row is the current lead fee.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadPricing {
    pub id: Uuid,
    pub price_pence: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Request payload for creating a quote.
#[derive(Debug, Deserialize)]
pub struct CreateQuoteRequest {
    pub start_address: String,
    pub end_address: String,
    #[serde(default)]
    pub photo_urls: Option<Vec<String>>,
    pub user_id: Uuid,
}

/// Query parameters for listing quotes.
#[derive(Debug, Deserialize)]
pub struct QuoteListParams {
    pub user_id: Uuid,
}

/// Request payload for recording booking interest.
#[derive(Debug, Deserialize)]
pub struct BookingInterestRequest {
    pub interested: bool,
}

/// Request payload for distributing a quote as a lead.
#[derive(Debug, Deserialize)]
pub struct DistributeRequest {
    pub quote_id: Uuid,
}

/// Per-company outcome of a distribution run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyOutcome {
    pub company_id: Uuid,
    pub company_name: String,
    /// "charged" or "skipped".
    pub status: String,
    /// Reason when skipped (e.g. insufficient balance at debit time).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response for the lead distribution endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DistributionResponse {
    /// Number of companies successfully charged.
    pub distributed_count: usize,
    /// One entry per matched company, success or failure.
    pub outcomes: Vec<CompanyOutcome>,
    /// Fee applied per company, in pence.
    pub fee_pence: i64,
    /// Resolved postcode area code, if any.
    pub prefix: Option<String>,
    /// True when the lead could not be routed and needs manual follow-up.
    pub fallback: bool,
}

/// Request payload for creating a wallet top-up checkout session.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub company_id: Uuid,
    pub amount_pence: i64,
}

/// Response containing the hosted checkout redirect URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

/// Request payload for the AI analysis proxy. Either reference a stored
/// quote or pass the move details inline.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub quote_id: Option<Uuid>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    #[serde(default)]
    pub photo_urls: Option<Vec<String>>,
}

/// One detected item in an analysis result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisItem {
    pub name: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_volume_ft3: Option<f64>,
}

/// Normalized analysis result returned to the client. Mirrors the vision
/// service's response shape, with the fallback path filling the same fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Price estimate in GBP.
    pub estimate: f64,
    /// Human-readable summary of the analysis.
    pub description: String,
    /// Itemized inventory.
    pub items: Vec<AnalysisItem>,
    /// Total volume in cubic metres.
    #[serde(rename = "totalVolumeM3")]
    pub total_volume_m3: f64,
    /// Total floor area in square metres.
    #[serde(rename = "totalAreaM2")]
    pub total_area_m2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub van_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_movers: Option<i32>,
    /// "vision" when the external service answered, "fallback" otherwise.
    pub pricing_method: String,
}

/// Admin view: a quote joined with its owner's email.
#[derive(Debug, FromRow, Serialize)]
pub struct AdminQuoteRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub start_address: String,
    pub end_address: String,
    pub status: String,
    pub booking_interest: Option<bool>,
    pub ai_estimate: Option<f64>,
    pub owner_email: Option<String>,
}

/// Admin view: aggregate counts across the system.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminSummary {
    pub total_quotes: i64,
    pub new_quotes: i64,
    pub booked_quotes: i64,
    pub active_companies: i64,
    /// Sum of all top-up ledger rows, in pence.
    pub total_topups_pence: i64,
    /// Sum of all lead-purchase ledger rows, in pence (negative).
    pub total_lead_charges_pence: i64,
}
