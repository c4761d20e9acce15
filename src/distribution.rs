use axum::{extract::State, Json};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::AppError,
    handlers::AppState,
    models::{CompanyOutcome, DistributeRequest, DistributionResponse, PartnerCompany, Profile, Quote},
    postcode::extract_area_code,
};

/// Lead distribution handler.
///
/// Flow:
/// 1. Load the quote (404 if absent).
/// 2. Extract the postcode area code from the start address; no prefix means
///    the lead cannot be routed and is reported back with `fallback: true`
///    for manual follow-up, with no balance mutations.
/// 3. Resolve the current lead fee (latest active pricing row, else the
///    configured default).
/// 4. Match active companies covering the prefix with sufficient balance.
/// 5. Charge each match sequentially: atomic conditional debit, then a
///    ledger row and a lead-purchase snapshot. A failed debit is recorded
///    as a skipped outcome and the loop continues.
///
/// Partial completion across companies is accepted: each company's charge
/// stands on its own, and the response lists a per-company outcome.
pub async fn distribute_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DistributeRequest>,
) -> Result<Json<DistributionResponse>, AppError> {
    tracing::info!("POST /leads/distribute - quote_id: {}", payload.quote_id);

    let response = run_distribution(
        &state.db,
        payload.quote_id,
        state.config.default_lead_price_pence,
    )
    .await?;

    Ok(Json(response))
}

/// Core distribution flow, separated from the HTTP layer.
pub async fn run_distribution(
    db: &PgPool,
    quote_id: Uuid,
    default_fee_pence: i64,
) -> Result<DistributionResponse, AppError> {
    // Step 1: Load the quote
    let quote = load_quote(db, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", quote_id)))?;

    // Step 2: Extract the routing prefix
    let Some(prefix) = extract_area_code(&quote.start_address) else {
        tracing::warn!(
            "No postcode prefix in start address for quote {} - flagging for manual follow-up",
            quote.id
        );
        return Ok(DistributionResponse {
            distributed_count: 0,
            outcomes: vec![],
            fee_pence: 0,
            prefix: None,
            fallback: true,
        });
    };

    // Step 3: Resolve the active lead fee
    let fee_pence = resolve_lead_fee(db, default_fee_pence).await?;

    // Step 4: Match companies by coverage and balance
    let companies = find_eligible_companies(db, &prefix, fee_pence).await?;

    if companies.is_empty() {
        tracing::info!(
            "No eligible companies for prefix {} at fee {}p - flagging for manual follow-up",
            prefix,
            fee_pence
        );
        return Ok(DistributionResponse {
            distributed_count: 0,
            outcomes: vec![],
            fee_pence,
            prefix: Some(prefix),
            fallback: true,
        });
    }

    // Step 5: Load the customer profile for the purchase snapshot
    let profile = load_profile(db, quote.user_id).await?;

    // Step 6: Charge each matching company sequentially
    let mut outcomes = Vec::with_capacity(companies.len());
    for company in companies {
        let outcome = match charge_company(db, &company, &quote, profile.as_ref(), fee_pence).await
        {
            Ok(true) => CompanyOutcome {
                company_id: company.id,
                company_name: company.name.clone(),
                status: "charged".to_string(),
                reason: None,
            },
            Ok(false) => {
                tracing::warn!(
                    "Skipped company {} ({}): balance dropped below fee before debit",
                    company.name,
                    company.id
                );
                CompanyOutcome {
                    company_id: company.id,
                    company_name: company.name.clone(),
                    status: "skipped".to_string(),
                    reason: Some("insufficient balance at charge time".to_string()),
                }
            }
            Err(e) => {
                tracing::error!(
                    "Failed to charge company {} ({}): {}",
                    company.name,
                    company.id,
                    e
                );
                CompanyOutcome {
                    company_id: company.id,
                    company_name: company.name.clone(),
                    status: "skipped".to_string(),
                    reason: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    let distributed_count = outcomes.iter().filter(|o| o.status == "charged").count();

    tracing::info!(
        "Distributed quote {} to {}/{} companies (prefix {}, fee {}p)",
        quote.id,
        distributed_count,
        outcomes.len(),
        prefix,
        fee_pence
    );

    Ok(DistributionResponse {
        distributed_count,
        outcomes,
        fee_pence,
        prefix: Some(prefix),
        fallback: false,
    })
}

/// Loads a quote by id.
pub async fn load_quote(db: &PgPool, quote_id: Uuid) -> Result<Option<Quote>, AppError> {
    let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1")
        .bind(quote_id)
        .fetch_optional(db)
        .await?;

    Ok(quote)
}

/// Resolves the current lead fee: the most recent active pricing row, or the
/// configured default when none exists.
async fn resolve_lead_fee(db: &PgPool, default_pence: i64) -> Result<i64, AppError> {
    let fee = sqlx::query_scalar::<_, i64>(
        "SELECT price_pence FROM lead_pricing
         WHERE active = true
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .fetch_optional(db)
    .await?;

    Ok(fee.unwrap_or(default_pence))
}

/// Finds active companies covering the prefix with balance at or above the fee.
async fn find_eligible_companies(
    db: &PgPool,
    prefix: &str,
    fee_pence: i64,
) -> Result<Vec<PartnerCompany>, AppError> {
    let companies = sqlx::query_as::<_, PartnerCompany>(
        "SELECT * FROM companies
         WHERE active = true
           AND $1 = ANY(coverage_prefixes)
           AND balance_pence >= $2
         ORDER BY created_at ASC",
    )
    .bind(prefix)
    .bind(fee_pence)
    .fetch_all(db)
    .await?;

    Ok(companies)
}

async fn load_profile(db: &PgPool, user_id: Uuid) -> Result<Option<Profile>, AppError> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    if profile.is_none() {
        tracing::warn!("No profile for user {} - purchase snapshot will be thin", user_id);
    }

    Ok(profile)
}

/// Charges one company for the lead: conditional debit, ledger row, purchase
/// snapshot, all in one transaction so the balance never moves without its
/// ledger row. Returns Ok(false) when the debit found no row to update, which
/// means the balance fell below the fee after matching (e.g. a concurrent
/// charge). The conditional UPDATE is what makes simultaneous debits against
/// one balance safe.
async fn charge_company(
    db: &PgPool,
    company: &PartnerCompany,
    quote: &Quote,
    profile: Option<&Profile>,
    fee_pence: i64,
) -> Result<bool, AppError> {
    let mut tx = db.begin().await?;

    let debited = sqlx::query(
        "UPDATE companies
         SET balance_pence = balance_pence - $1
         WHERE id = $2 AND active = true AND balance_pence >= $1",
    )
    .bind(fee_pence)
    .bind(company.id)
    .execute(&mut *tx)
    .await?;

    if debited.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO wallet_transactions (id, company_id, amount_pence, kind, description, quote_id)
         VALUES ($1, $2, $3, 'lead_purchase', $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(company.id)
    .bind(-fee_pence)
    .bind(purchase_description(quote))
    .bind(quote.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO lead_purchases (
            id, company_id, quote_id, amount_pence,
            customer_name, customer_email,
            start_address, end_address,
            ai_estimate, ai_volume_m3, status
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'new')",
    )
    .bind(Uuid::new_v4())
    .bind(company.id)
    .bind(quote.id)
    .bind(fee_pence)
    .bind(profile.and_then(|p| p.full_name.clone()))
    .bind(profile.map(|p| p.email.clone()))
    .bind(&quote.start_address)
    .bind(&quote.end_address)
    .bind(quote.ai_estimate)
    .bind(quote.ai_volume_m3)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Charged company {} ({}) {}p for quote {}",
        company.name,
        company.id,
        fee_pence,
        quote.id
    );

    Ok(true)
}

/// Ledger description for a lead charge.
fn purchase_description(quote: &Quote) -> String {
    format!(
        "Lead purchase: {} -> {}",
        quote.start_address, quote.end_address
    )
}
