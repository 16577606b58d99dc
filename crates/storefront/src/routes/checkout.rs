//! Checkout route handlers.

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode};
use lemu_core::{CardForm, CheckoutEntry, MpesaForm, PaymentMethod, PersonalInfoForm, ProductId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::checkout::{CheckoutFlow, CheckoutSession, ConfirmationStatus};
use crate::commerce::{CommerceApi, CommerceClient};
use crate::error::Result;
use crate::middleware::RequireStore;
use crate::state::AppState;

/// Body for `POST /checkout/buy-now`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyNowForm {
    pub product: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub selected_options: BTreeMap<String, String>,
}

/// Body for `POST /checkout/start`.
#[derive(Debug, Deserialize)]
pub struct StartForm {
    #[serde(default)]
    pub entry: CheckoutEntry,
}

/// Body for `POST /checkout/payment/method`.
#[derive(Debug, Deserialize)]
pub struct MethodForm {
    pub method: PaymentMethod,
}

fn flow<'a>(state: &'a AppState, session: &'a Session) -> CheckoutFlow<'a, CommerceClient> {
    CheckoutFlow::new(
        session,
        state.commerce(),
        &state.config().commerce,
        state.payments(),
    )
}

/// Stage one product and begin a buy-now checkout.
#[instrument(skip(state, session))]
pub async fn buy_now(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<BuyNowForm>,
) -> Result<Json<CheckoutSession>> {
    let product = state.commerce().product(form.product).await?;
    let checkout = flow(&state, &session)
        .buy_now(&product, form.quantity, &form.selected_options)
        .await?;
    Ok(Json(checkout))
}

/// Begin checkout from the cart or the staged buy-now item.
#[instrument(skip(state, session))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<StartForm>,
) -> Result<Json<CheckoutSession>> {
    Ok(Json(flow(&state, &session).begin(form.entry).await?))
}

/// The checkout in progress, or `null`.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Json<Option<CheckoutSession>> {
    Json(flow(&state, &session).current().await)
}

/// Submit personal details; creates the customer and the order.
#[instrument(skip(state, session, store, form))]
pub async fn personal(
    State(state): State<AppState>,
    session: Session,
    RequireStore(store): RequireStore,
    Json(form): Json<PersonalInfoForm>,
) -> Result<Json<CheckoutSession>> {
    Ok(Json(flow(&state, &session).submit_personal(&store, &form).await?))
}

/// Choose how to pay.
#[instrument(skip(state, session))]
pub async fn method(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<MethodForm>,
) -> Result<Json<CheckoutSession>> {
    Ok(Json(flow(&state, &session).choose_method(form.method).await?))
}

/// Send the M-Pesa STK push.
#[instrument(skip(state, session, store, form))]
pub async fn mpesa(
    State(state): State<AppState>,
    session: Session,
    RequireStore(store): RequireStore,
    Json(form): Json<MpesaForm>,
) -> Result<Json<CheckoutSession>> {
    Ok(Json(flow(&state, &session).pay_mpesa(&store, &form).await?))
}

/// Submit card details.
#[instrument(skip(state, session, form))]
pub async fn card(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<CardForm>,
) -> Result<Json<CheckoutSession>> {
    Ok(Json(flow(&state, &session).pay_card(&form).await?))
}

/// Payment confirmation progress.
#[instrument(skip(state, session))]
pub async fn status(State(state): State<AppState>, session: Session) -> Result<Json<ConfirmationStatus>> {
    Ok(Json(flow(&state, &session).confirmation_status().await?))
}

/// Discard the checkout.
#[instrument(skip(state, session))]
pub async fn abandon(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    flow(&state, &session).abandon().await?;
    Ok(StatusCode::NO_CONTENT)
}
