//! Checkout operations over one visitor's session.

use std::collections::BTreeMap;

use lemu_core::{
    CardForm, Cart, CartLineItem, CheckoutEntry, MpesaForm, PaymentMethod, PersonalInfoForm,
    check_quantity,
};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::commerce::{
    CommerceApi, CreateCustomerRequest, CreateOrderRequest, OrderLine, PaymentStatusSource,
    Product, StkPushRequest, StoreConfig,
};
use crate::config::CommerceConfig;
use crate::models::{load_or_default, session_keys};
use crate::payments::{PaymentMonitor, PollState};

use super::CheckoutError;
use super::state::{CheckoutSession, CheckoutStep, ConfirmationStatus, PaymentOutcome};

/// Checkout operations for one request.
pub struct CheckoutFlow<'a, A> {
    session: &'a Session,
    api: &'a A,
    commerce: &'a CommerceConfig,
    monitor: &'a PaymentMonitor,
}

impl<'a, A> CheckoutFlow<'a, A>
where
    A: CommerceApi + PaymentStatusSource + Clone,
{
    #[must_use]
    pub const fn new(
        session: &'a Session,
        api: &'a A,
        commerce: &'a CommerceConfig,
        monitor: &'a PaymentMonitor,
    ) -> Self {
        Self {
            session,
            api,
            commerce,
            monitor,
        }
    }

    /// The checkout in progress, if any.
    pub async fn current(&self) -> Option<CheckoutSession> {
        load_or_default(self.session, session_keys::CHECKOUT).await
    }

    async fn require(&self, expected: CheckoutStep) -> Result<CheckoutSession, CheckoutError> {
        let checkout = self.current().await.ok_or(CheckoutError::NotStarted)?;
        if checkout.step != expected {
            return Err(CheckoutError::InvalidStep {
                expected,
                actual: checkout.step,
            });
        }
        Ok(checkout)
    }

    async fn save(&self, checkout: &CheckoutSession) -> Result<(), CheckoutError> {
        self.session.insert(session_keys::CHECKOUT, checkout).await?;
        Ok(())
    }

    async fn discard(&self) -> Result<(), CheckoutError> {
        self.session.remove_value(session_keys::CHECKOUT).await?;
        self.session.remove_value(session_keys::CHECKOUT_ENTRY).await?;
        Ok(())
    }

    /// Stage a single product for direct purchase and begin a buy-now
    /// checkout. The cart is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Quantity`] if `quantity` exceeds the stock.
    #[instrument(skip(self, product, options), fields(product_id = %product.id))]
    pub async fn buy_now(
        &self,
        product: &Product,
        quantity: u32,
        options: &BTreeMap<String, String>,
    ) -> Result<CheckoutSession, CheckoutError> {
        check_quantity(product.id, quantity, product.current_stock)?;
        let item = product.to_line_item(quantity, product.resolve_options(options));
        self.session.insert(session_keys::BUY_NOW_ITEM, &item).await?;
        self.begin(CheckoutEntry::BuyNow).await
    }

    /// Start a checkout, replacing any checkout already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingBuyNowItem`] for a buy-now entry
    /// without a staged item.
    #[instrument(skip(self))]
    pub async fn begin(&self, entry: CheckoutEntry) -> Result<CheckoutSession, CheckoutError> {
        if entry == CheckoutEntry::BuyNow && self.buy_now_item().await.is_none() {
            return Err(CheckoutError::MissingBuyNowItem);
        }

        if let Some(previous) = self.current().await
            && let Some(payment) = previous.payment
        {
            self.monitor.stop(&payment.request_id).await;
        }

        let checkout = CheckoutSession::new(entry);
        self.session.insert(session_keys::CHECKOUT_ENTRY, entry).await?;
        self.save(&checkout).await?;
        Ok(checkout)
    }

    async fn buy_now_item(&self) -> Option<CartLineItem> {
        load_or_default(self.session, session_keys::BUY_NOW_ITEM).await
    }

    async fn order_lines(&self, entry: CheckoutEntry) -> Result<Vec<CartLineItem>, CheckoutError> {
        let lines = match entry {
            CheckoutEntry::Cart => load_or_default(self.session, session_keys::CART_ITEMS).await,
            CheckoutEntry::BuyNow => self
                .buy_now_item()
                .await
                .map(|item| vec![item])
                .ok_or(CheckoutError::MissingBuyNowItem)?,
        };
        let lines: Vec<CartLineItem> = lines.into_iter().filter(|l| l.quantity > 0).collect();
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(lines)
    }

    async fn clear_order_source(&self, entry: CheckoutEntry) -> Result<(), CheckoutError> {
        let key = match entry {
            CheckoutEntry::Cart => session_keys::CART_ITEMS,
            CheckoutEntry::BuyNow => session_keys::BUY_NOW_ITEM,
        };
        self.session.remove_value(key).await?;
        Ok(())
    }

    /// Validate personal details, create the customer and the order.
    ///
    /// A customer created by an earlier attempt with the same details is
    /// reused. On any failure the checkout stays at the personal step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] or [`CheckoutError::EmptyCart`]
    /// without touching the network, [`CheckoutError::MissingCustomerId`]
    /// if the API returns no customer ID, and [`CheckoutError::OrderFailed`]
    /// if the order is rejected.
    #[instrument(skip_all, fields(store_id = %store.store_id))]
    pub async fn submit_personal(
        &self,
        store: &StoreConfig,
        form: &PersonalInfoForm,
    ) -> Result<CheckoutSession, CheckoutError> {
        let mut checkout = self.require(CheckoutStep::Personal).await?;
        let info = form.validate()?;
        let lines = self.order_lines(checkout.entry).await?;

        let reuse = checkout.customer_id.is_some() && checkout.personal_info.as_ref() == Some(&info);
        let customer_id = match checkout.customer_id.filter(|_| reuse) {
            Some(id) => id,
            None => {
                let request = CreateCustomerRequest {
                    first_name: info.first_name.clone(),
                    middle_name: info.middle_name.clone(),
                    last_name: info.last_name.clone(),
                    email: info.email.to_string(),
                    mobile_number: info.mobile_number.to_string(),
                    use_pickup_point: info.pickup_location.is_some(),
                    pickup_location: info.pickup_location.clone(),
                    merchant_id: info.merchant_id.or(store.merchant_id),
                };
                let response = self.api.create_customer(&request).await?;
                let id = response.id.ok_or(CheckoutError::MissingCustomerId)?;
                info!(customer_id = %id, "Customer created");
                id
            }
        };

        checkout.personal_info = Some(info);
        checkout.customer_id = Some(customer_id);

        let order = CreateOrderRequest {
            customer_id,
            store_id: store.store_id,
            cart: lines.iter().map(OrderLine::from).collect(),
        };
        let response = match self.api.create_order(&order).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Order creation failed");
                self.save(&checkout).await?;
                return Err(CheckoutError::OrderFailed(e));
            }
        };
        info!(order_id = %response.order_id, "Order created");

        let computed = Cart::from_items(lines).totals(None)?.total;
        checkout.order_id = Some(response.order_id);
        checkout.order_total = Some(response.amount.unwrap_or(computed));
        checkout.payment_url = Some(self.commerce.payment_url(response.order_id).to_string());
        checkout.step = CheckoutStep::Payment;

        self.clear_order_source(checkout.entry).await?;
        self.save(&checkout).await?;
        Ok(checkout)
    }

    /// Pick how to pay.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidStep`] outside the payment step.
    pub async fn choose_method(&self, method: PaymentMethod) -> Result<CheckoutSession, CheckoutError> {
        let mut checkout = self.require(CheckoutStep::Payment).await?;
        checkout.payment_method = Some(method);
        self.save(&checkout).await?;
        Ok(checkout)
    }

    fn require_method(checkout: &CheckoutSession, method: PaymentMethod) -> Result<(), CheckoutError> {
        if checkout.payment_method == Some(method) {
            Ok(())
        } else {
            Err(CheckoutError::MethodNotChosen(method))
        }
    }

    /// Send an M-Pesa STK push and start polling for its confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] for a malformed number or any
    /// commerce error from the push itself; the checkout stays at the
    /// payment step.
    #[instrument(skip_all, fields(store_id = %store.store_id))]
    pub async fn pay_mpesa(&self, store: &StoreConfig, form: &MpesaForm) -> Result<CheckoutSession, CheckoutError> {
        let mut checkout = self.require(CheckoutStep::Payment).await?;
        Self::require_method(&checkout, PaymentMethod::Mpesa)?;
        let phone = form.validate()?;
        let order_id = checkout.order_id.ok_or(CheckoutError::NotStarted)?;

        let request = StkPushRequest {
            order_id,
            phone_number: phone.digits(),
            store_id: store.store_id,
            amount: checkout.order_total.unwrap_or_default(),
        };
        let payment = self.api.stk_push(&request).await?;
        info!(request_id = %payment.request_id, "STK push sent");

        self.monitor.start(self.api.clone(), payment.clone()).await;

        checkout.payment = Some(payment);
        checkout.outcome = None;
        checkout.step = CheckoutStep::AwaitingConfirmation;
        self.save(&checkout).await?;
        Ok(checkout)
    }

    /// Accept card details. No gateway is involved; a valid card completes
    /// the checkout.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] for malformed card fields.
    pub async fn pay_card(&self, form: &CardForm) -> Result<CheckoutSession, CheckoutError> {
        let mut checkout = self.require(CheckoutStep::Payment).await?;
        Self::require_method(&checkout, PaymentMethod::Card)?;
        let card = form.validate()?;

        checkout.card = Some(card);
        checkout.outcome = None;
        checkout.step = CheckoutStep::Completed;
        self.discard().await?;
        info!(order_id = ?checkout.order_id, "Checkout completed by card");
        Ok(checkout)
    }

    /// Report the payment confirmation and advance the checkout when the
    /// poll is over.
    ///
    /// Success completes and removes the checkout. Failure, timeout or a
    /// lost poller returns to the payment step with the outcome recorded.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidStep`] when no payment is awaiting
    /// confirmation.
    pub async fn confirmation_status(&self) -> Result<ConfirmationStatus, CheckoutError> {
        let mut checkout = self.require(CheckoutStep::AwaitingConfirmation).await?;
        let payment = checkout.payment.clone().ok_or(CheckoutError::InvalidStep {
            expected: CheckoutStep::AwaitingConfirmation,
            actual: CheckoutStep::Payment,
        })?;

        let poll = match self.monitor.get(&payment.request_id).await {
            Some(handle) => handle.state(),
            None => {
                warn!(request_id = %payment.request_id, "Payment poller no longer tracked");
                PollState::TimedOut {
                    request_id: payment.request_id.clone(),
                }
            }
        };

        match &poll {
            PollState::Polling { .. } => {}
            PollState::Complete { .. } => {
                self.monitor.stop(&payment.request_id).await;
                checkout.step = CheckoutStep::Completed;
                self.discard().await?;
                info!(order_id = ?checkout.order_id, "Checkout completed by M-Pesa");
            }
            terminal => {
                self.monitor.stop(&payment.request_id).await;
                checkout.outcome = PaymentOutcome::from_poll(terminal);
                checkout.payment = None;
                checkout.step = CheckoutStep::Payment;
                self.save(&checkout).await?;
            }
        }

        Ok(ConfirmationStatus { checkout, poll })
    }

    /// Discard the checkout from any step and stop its poller.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn abandon(&self) -> Result<(), CheckoutError> {
        if let Some(checkout) = self.current().await {
            if let Some(payment) = &checkout.payment {
                self.monitor.stop(&payment.request_id).await;
            }
            if checkout.entry == CheckoutEntry::BuyNow {
                self.session.remove_value(session_keys::BUY_NOW_ITEM).await?;
            }
        }
        self.discard().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lemu_core::{CustomerId, Money, OrderId, PaymentStatus, ProductId};
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::commerce::fake::{FakeCommerce, FakeStatus};
    use crate::config::PaymentPollConfig;

    struct Harness {
        session: Session,
        api: FakeCommerce,
        commerce: CommerceConfig,
        monitor: PaymentMonitor,
    }

    impl Harness {
        fn new(api: FakeCommerce) -> Self {
            Self {
                session: Session::new(None, Arc::new(MemoryStore::default()), None),
                api,
                commerce: CommerceConfig::default(),
                monitor: PaymentMonitor::new(PaymentPollConfig::default()),
            }
        }

        fn flow(&self) -> CheckoutFlow<'_, FakeCommerce> {
            CheckoutFlow::new(&self.session, &self.api, &self.commerce, &self.monitor)
        }

        async fn fill_cart(&self) {
            let items = vec![line(1, 2, 1000), line(2, 1, 500)];
            self.session.insert(session_keys::CART_ITEMS, items).await.unwrap();
        }
    }

    fn api() -> FakeCommerce {
        FakeCommerce::new()
            .with_customer_id(Some(CustomerId::new(5)))
            .with_order_id(Some(OrderId::new(99)))
    }

    fn store() -> StoreConfig {
        serde_json::from_value(serde_json::json!({"storeId": 7, "merchantId": 3})).unwrap()
    }

    fn line(id: i64, quantity: u32, price: i64) -> CartLineItem {
        CartLineItem {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            image_url: None,
            sale_price: Money::from_units(price),
            original_price: Money::from_units(price),
            quantity,
            selected_options: BTreeMap::new(),
        }
    }

    fn personal() -> PersonalInfoForm {
        PersonalInfoForm {
            first_name: "Wanjiku".to_string(),
            last_name: "Kamau".to_string(),
            email: "wanjiku@example.com".to_string(),
            mobile_number: "+254 712 345 678".to_string(),
            ..PersonalInfoForm::default()
        }
    }

    fn mpesa() -> MpesaForm {
        MpesaForm {
            mpesa_number: "+254 712-345-678".to_string(),
        }
    }

    async fn at_payment(h: &Harness) {
        h.fill_cart().await;
        h.flow().begin(CheckoutEntry::Cart).await.unwrap();
        h.flow().submit_personal(&store(), &personal()).await.unwrap();
    }

    #[tokio::test]
    async fn test_personal_step_creates_order_and_clears_cart() {
        let h = Harness::new(api());
        h.fill_cart().await;
        h.flow().begin(CheckoutEntry::Cart).await.unwrap();

        let checkout = h.flow().submit_personal(&store(), &personal()).await.unwrap();
        assert_eq!(checkout.step, CheckoutStep::Payment);
        assert_eq!(checkout.customer_id, Some(CustomerId::new(5)));
        assert_eq!(checkout.order_id, Some(OrderId::new(99)));
        // 2 x 1000 + 500, plus shipping below the free threshold.
        assert_eq!(checkout.order_total, Some(Money::from_units(3000)));
        assert_eq!(
            checkout.payment_url.as_deref(),
            Some("https://payments.lemuapps.com/payments/checkout/?orderId=99")
        );

        let orders = h.api.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].store_id, store().store_id);
        assert_eq!(orders[0].cart.len(), 2);

        let cart: Vec<CartLineItem> = load_or_default(&h.session, session_keys::CART_ITEMS).await;
        assert!(cart.is_empty());
        assert_eq!(h.flow().current().await, Some(checkout));
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_calls() {
        let h = Harness::new(api());
        h.fill_cart().await;
        h.flow().begin(CheckoutEntry::Cart).await.unwrap();

        let err = h
            .flow()
            .submit_personal(&store(), &PersonalInfoForm::default())
            .await
            .unwrap_err();
        let CheckoutError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("firstName"), Some("First name is required"));
        assert_eq!(h.api.customer_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_makes_no_calls() {
        let h = Harness::new(api());
        h.flow().begin(CheckoutEntry::Cart).await.unwrap();

        let err = h.flow().submit_personal(&store(), &personal()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(h.api.customer_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_customer_id_stays_personal() {
        let h = Harness::new(api().with_customer_id(None));
        h.fill_cart().await;
        h.flow().begin(CheckoutEntry::Cart).await.unwrap();

        let err = h.flow().submit_personal(&store(), &personal()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::MissingCustomerId));
        assert_eq!(h.flow().current().await.unwrap().step, CheckoutStep::Personal);
        assert!(h.api.orders().is_empty());
    }

    #[tokio::test]
    async fn test_order_failure_retains_customer() {
        let h = Harness::new(api().with_order_id(None));
        h.fill_cart().await;
        h.flow().begin(CheckoutEntry::Cart).await.unwrap();

        let err = h.flow().submit_personal(&store(), &personal()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OrderFailed(_)));

        let checkout = h.flow().current().await.unwrap();
        assert_eq!(checkout.step, CheckoutStep::Personal);
        assert_eq!(checkout.customer_id, Some(CustomerId::new(5)));

        // Retrying with the same details reuses the customer.
        let _ = h.flow().submit_personal(&store(), &personal()).await;
        assert_eq!(h.api.customer_calls(), 1);
        let cart: Vec<CartLineItem> = load_or_default(&h.session, session_keys::CART_ITEMS).await;
        assert_eq!(cart.len(), 2);
    }

    #[tokio::test]
    async fn test_buy_now_leaves_cart_alone() {
        let h = Harness::new(api());
        h.fill_cart().await;
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": 3, "name": "Tote", "salePrice": 6000, "currentStock": 2
        }))
        .unwrap();

        let err = h.flow().buy_now(&product, 3, &BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Quantity(_)));

        let checkout = h.flow().buy_now(&product, 2, &BTreeMap::new()).await.unwrap();
        assert_eq!(checkout.entry, CheckoutEntry::BuyNow);

        let checkout = h.flow().submit_personal(&store(), &personal()).await.unwrap();
        let orders = h.api.orders();
        assert_eq!(orders[0].cart.len(), 1);
        assert_eq!(orders[0].cart[0].quantity, 2);
        // 12000 is above the free-shipping threshold.
        assert_eq!(checkout.order_total, Some(Money::from_units(12000)));

        let cart: Vec<CartLineItem> = load_or_default(&h.session, session_keys::CART_ITEMS).await;
        assert_eq!(cart.len(), 2);
        assert!(h.flow().buy_now_item().await.is_none());
    }

    #[tokio::test]
    async fn test_buy_now_entry_requires_item() {
        let h = Harness::new(api());
        let err = h.flow().begin(CheckoutEntry::BuyNow).await.unwrap_err();
        assert!(matches!(err, CheckoutError::MissingBuyNowItem));
    }

    #[tokio::test]
    async fn test_payment_requires_chosen_method() {
        let h = Harness::new(api());
        at_payment(&h).await;

        let err = h.flow().pay_mpesa(&store(), &mpesa()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::MethodNotChosen(PaymentMethod::Mpesa)));
    }

    #[tokio::test]
    async fn test_card_completes_and_discards() {
        let h = Harness::new(api());
        at_payment(&h).await;
        h.flow().choose_method(PaymentMethod::Card).await.unwrap();

        let form = CardForm {
            card_number: "4242 4242 4242 4242".to_string(),
            card_expiry: "12/30".to_string(),
            card_cvc: "123".to_string(),
        };
        let checkout = h.flow().pay_card(&form).await.unwrap();
        assert_eq!(checkout.step, CheckoutStep::Completed);
        assert_eq!(checkout.card.unwrap().last_four, "4242");
        assert!(h.flow().current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mpesa_confirmed() {
        let h = Harness::new(api().with_statuses([
            FakeStatus::Status(PaymentStatus::Pending),
            FakeStatus::Status(PaymentStatus::Complete),
        ]));
        at_payment(&h).await;
        h.flow().choose_method(PaymentMethod::Mpesa).await.unwrap();

        let checkout = h.flow().pay_mpesa(&store(), &mpesa()).await.unwrap();
        assert_eq!(checkout.step, CheckoutStep::AwaitingConfirmation);
        let push = &h.api.stk_pushes()[0];
        assert_eq!(push.order_id, OrderId::new(99));
        assert_eq!(push.amount, Money::from_units(3000));
        assert_eq!(push.phone_number, "254712345678");

        let status = h.flow().confirmation_status().await.unwrap();
        assert!(matches!(status.poll, PollState::Polling { .. }));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let status = h.flow().confirmation_status().await.unwrap();
        assert!(matches!(status.poll, PollState::Complete { .. }));
        assert_eq!(status.checkout.step, CheckoutStep::Completed);
        assert!(h.flow().current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mpesa_timeout_returns_to_payment() {
        let h = Harness::new(api());
        at_payment(&h).await;
        h.flow().choose_method(PaymentMethod::Mpesa).await.unwrap();
        h.flow().pay_mpesa(&store(), &mpesa()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        let status = h.flow().confirmation_status().await.unwrap();
        assert!(matches!(status.poll, PollState::TimedOut { .. }));
        assert_eq!(status.checkout.step, CheckoutStep::Payment);
        assert_eq!(status.checkout.outcome, Some(PaymentOutcome::TimedOut));

        // The visitor may retry by hand.
        h.flow().pay_mpesa(&store(), &mpesa()).await.unwrap();
        assert_eq!(h.api.stk_pushes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_cancels_poller() {
        let h = Harness::new(api());
        at_payment(&h).await;
        h.flow().choose_method(PaymentMethod::Mpesa).await.unwrap();
        let checkout = h.flow().pay_mpesa(&store(), &mpesa()).await.unwrap();
        let request_id = checkout.payment.unwrap().request_id;
        let handle = h.monitor.get(&request_id).await.unwrap();

        h.flow().abandon().await.unwrap();
        assert_eq!(handle.finished().await, PollState::Cancelled);
        assert!(h.flow().current().await.is_none());

        let err = h.flow().confirmation_status().await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotStarted));
    }
}
