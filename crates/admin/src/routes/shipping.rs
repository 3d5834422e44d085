//! Melhor Envio settings API.
//!
//! Admin clients edit an [`EditorDraft`]: rules in editable form with row
//! keys. The token is always masked on the way out, and a draft that sends
//! the masked value back keeps the stored token.

use atelie_core::shipping::{
    CARRIER_CATALOG, Carrier, CarrierQuote, EditorCommand, EditorDraft, EditorError,
    MelhorEnvioConfig, RouteContext, ShippingConfigEditor, ShippingOffer, UF_CODES,
    apply_free_shipping, is_known_carrier, is_known_uf, mask_token,
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::backend::ProviderConfigStore;
use crate::error::{AppError, Result};
use crate::state::AppState;

const BASE_PATH: &str = "/api/shipping/melhor-envio";

/// Build the shipping settings router.
pub fn router<S: ProviderConfigStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route(BASE_PATH, get(show::<S>).put(replace::<S>).patch(edit::<S>))
        .route(&format!("{BASE_PATH}/preview"), post(preview))
        .route(&format!("{BASE_PATH}/evaluate"), post(evaluate::<S>))
}

/// Everything the settings screen needs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    /// Editable form, token masked.
    pub draft: EditorDraft,
    /// Encoded configuration, token masked.
    pub config: MelhorEnvioConfig,
    pub carriers: &'static [Carrier],
    pub regions: &'static [&'static str],
}

impl EditorView {
    fn new(draft: EditorDraft) -> Self {
        let config = draft.to_config().masked();
        let draft = EditorDraft {
            token: mask_token(&draft.token),
            ..draft
        };
        Self {
            draft,
            config,
            carriers: &CARRIER_CATALOG,
            regions: &UF_CODES,
        }
    }
}

/// `PATCH` body: commands applied in order to `draft`, or to the stored
/// configuration when no draft is sent.
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub draft: Option<EditorDraft>,
    pub commands: Vec<EditorCommand>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// Destination UF.
    #[serde(default)]
    pub region: Option<String>,
    pub total: Decimal,
    /// Carrier quotes to price, optional.
    #[serde(default)]
    pub quotes: Vec<CarrierQuote>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub free_shipping: bool,
    /// Names of the rules that match.
    pub matching_rules: Vec<String>,
    pub offers: Vec<ShippingOffer>,
}

/// Current settings.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
#[instrument(skip(state))]
pub async fn show<S: ProviderConfigStore>(State(state): State<AppState<S>>) -> Result<Json<EditorView>> {
    let config = state.store().load().await?;
    Ok(Json(EditorView::new(EditorDraft::from_config(&config))))
}

/// Replace the settings with a submitted draft.
///
/// # Errors
///
/// Returns [`AppError::Editor`] for unknown carriers or regions, or a
/// backend error if saving fails.
#[instrument(skip(state, draft))]
pub async fn replace<S: ProviderConfigStore>(
    State(state): State<AppState<S>>,
    Json(draft): Json<EditorDraft>,
) -> Result<Json<EditorView>> {
    validate_draft(&draft)?;
    let stored = state.store().load().await?;
    let draft = restore_token(draft, &stored);

    state.store().save(&draft.to_config()).await?;
    tracing::info!(rules = draft.rules.len(), "shipping settings replaced");
    Ok(Json(EditorView::new(draft)))
}

/// Apply editor commands and save the result. A rejected command rejects
/// the whole request and nothing is saved.
///
/// # Errors
///
/// Returns [`AppError::Editor`] for a rejected command, or a backend error.
#[instrument(skip(state, request), fields(commands = request.commands.len()))]
pub async fn edit<S: ProviderConfigStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<EditRequest>,
) -> Result<Json<EditorView>> {
    let stored = state.store().load().await?;
    let draft = match request.draft {
        Some(draft) => {
            validate_draft(&draft)?;
            restore_token(draft, &stored)
        }
        None => EditorDraft::from_config(&stored),
    };

    let mut emitted = None;
    let draft = {
        let mut editor = ShippingConfigEditor::from_draft(draft, |config: &MelhorEnvioConfig| {
            emitted = Some(config.clone());
        });
        for command in request.commands {
            editor.apply(command)?;
        }
        editor.draft().clone()
    };

    let config = emitted.ok_or_else(|| AppError::Internal("editor emitted nothing".to_string()))?;
    state.store().save(&config).await?;
    Ok(Json(EditorView::new(draft)))
}

/// Encode a draft without saving it.
///
/// # Errors
///
/// Returns [`AppError::Editor`] for unknown carriers or regions.
pub async fn preview(Json(draft): Json<EditorDraft>) -> Result<Json<EditorView>> {
    validate_draft(&draft)?;
    Ok(Json(EditorView::new(draft)))
}

/// Which stored rules grant free shipping for a destination and subtotal.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
#[instrument(skip(state, request), fields(region = ?request.region, total = %request.total))]
pub async fn evaluate<S: ProviderConfigStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>> {
    let config = state.store().load().await?;
    let route = RouteContext::new(request.region.as_deref(), request.total);

    let matching_rules: Vec<String> = config
        .decoded_rules()
        .into_iter()
        .filter(|rule| rule.predicate().evaluate(&route))
        .map(|rule| rule.name)
        .collect();
    let offers = apply_free_shipping(request.quotes, &config, &route);

    Ok(Json(EvaluateResponse {
        free_shipping: !matching_rules.is_empty(),
        matching_rules,
        offers,
    }))
}

fn validate_draft(draft: &EditorDraft) -> std::result::Result<(), EditorError> {
    if let Some(carrier) = draft.allowed_carriers.iter().find(|c| !is_known_carrier(c)) {
        return Err(EditorError::UnknownCarrier(carrier.clone()));
    }
    if let Some(code) = draft
        .rules
        .iter()
        .filter_map(|rule| rule.state.code())
        .find(|code| !is_known_uf(code))
    {
        return Err(EditorError::UnknownRegion(code.to_string()));
    }
    Ok(())
}

/// Put the stored token back when the draft echoes its masked form.
fn restore_token(mut draft: EditorDraft, stored: &MelhorEnvioConfig) -> EditorDraft {
    if let Some(token) = stored.token.as_deref()
        && !token.is_empty()
        && draft.token == mask_token(token)
    {
        draft.token = token.to_string();
    }
    draft
}
