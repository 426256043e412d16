use crate::application::discount_service::quote_code;
use crate::errors::AppError;
use chrono::Utc;
use commerce_types::domain::checkout::Checkout;
use commerce_types::domain::order::{
    CancelRequest, ListResult, Order, OrderDetail, OrderFilter, OrderTotals, OrderView,
    PaymentError, PaymentEvent, PaymentMethod, PaymentStatus, StatusUpdate,
};
use commerce_types::domain::order_status::{OrderStatus, OrderStatusName, TransitionError};
use commerce_types::domain::principal::{Principal, Role};
use commerce_types::ports::CommerceRepository;
use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

fn bad_request(e: anyhow::Error) -> AppError {
    AppError::BadRequest(e.to_string())
}

fn first_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    #[serde(default)]
    pub status: Option<OrderStatusName>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            user_id: None,
            page: first_page(),
            limit: default_limit(),
        }
    }
}

/// Owns the order lifecycle. Every status change, whether requested by
/// staff, by the customer cancelling, or by a payment outcome, goes through
/// `transition` and therefore through the one transition table.
pub struct OrderService<R: CommerceRepository> {
    repo: R,
}

impl<R: CommerceRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn create_order(
        &self,
        principal: &Principal,
        checkout: Checkout,
    ) -> Result<OrderView, AppError> {
        checkout.validate().map_err(bad_request)?;
        let user_id = order_owner(principal, checkout.user_id)?;
        let pending = self.required_status(OrderStatusName::Pending).await?;

        let mut details = Vec::with_capacity(checkout.items.len());
        for item in &checkout.items {
            let product = self
                .repo
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("product {} not found", item.product_id))
                })?;
            if product.stock_quantity < i64::from(item.quantity) {
                tracing::warn!(
                    product_id = %product.id,
                    wanted = item.quantity,
                    available = product.stock_quantity,
                    "insufficient stock"
                );
                return Err(AppError::BadRequest(format!(
                    "insufficient stock for product {}",
                    product.id
                )));
            }
            details.push(
                OrderDetail::snapshot(Uuid::nil(), &product, item.quantity, item.note.clone())
                    .map_err(bad_request)?,
            );
        }

        let shipping_fee = checkout.shipping_fee.unwrap_or(0);
        let subtotal = OrderTotals::compute(&details, shipping_fee, 0)
            .map_err(bad_request)?
            .subtotal;
        let (discount, discount_code) = match checkout.discount_code() {
            Some(code) => {
                let quote = quote_code(&self.repo, code, subtotal, Utc::now()).await?;
                (quote.discount_amount, Some(quote.code))
            }
            None => (0, None),
        };
        let totals = OrderTotals::compute(&details, shipping_fee, discount)
            .map_err(bad_request)?;
        reconcile(&checkout, &totals)?;

        let mut order = Order::new(
            user_id,
            pending.id,
            checkout.payment_method,
            checkout.receiver,
            totals,
            discount_code,
            checkout.note,
        );
        for d in &mut details {
            d.order_id = order.id;
        }

        order = self.repo.place_order(order, details.clone()).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            %user_id,
            total_price = order.total_price,
            "order created"
        );
        Ok(OrderView {
            order,
            status: pending,
            details,
        })
    }

    pub async fn get_order(&self, principal: &Principal, id: Uuid) -> Result<OrderView, AppError> {
        let order = self.visible_order(principal, id).await?;
        self.view(order).await
    }

    /// Newest first. Customers only ever see their own orders.
    pub async fn list_orders(
        &self,
        principal: &Principal,
        query: OrderQuery,
    ) -> Result<ListResult<Order>, AppError> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let user_id = if principal.role == Role::Customer {
            Some(principal.id)
        } else {
            query.user_id
        };
        let order_status_id = match query.status {
            Some(name) => match self.repo.find_status_by_name(name).await? {
                Some(status) => Some(status.id),
                None => {
                    return Ok(ListResult {
                        items: Vec::new(),
                        total: 0,
                        page,
                        limit,
                    })
                }
            },
            None => None,
        };
        let filter = OrderFilter {
            user_id,
            order_status_id,
            page,
            limit,
        };
        Ok(self.repo.list_orders(filter).await?)
    }

    pub async fn update_status(
        &self,
        principal: &Principal,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<OrderView, AppError> {
        if !principal.is_staff() {
            return Err(AppError::Forbidden("staff role required".into()));
        }
        let order = self.load(id).await?;
        let target = self
            .repo
            .get_status(update.order_status_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("order status {} not found", update.order_status_id))
            })?;
        if !target.is_active {
            return Err(AppError::BadRequest(format!(
                "order status {} is not active",
                target.name
            )));
        }
        self.transition(order, target, update.cancelled_reason, update.note)
            .await
    }

    /// Owner or staff cancellation; restocks every line.
    pub async fn cancel_order(
        &self,
        principal: &Principal,
        id: Uuid,
        request: CancelRequest,
    ) -> Result<OrderView, AppError> {
        let order = self.visible_order(principal, id).await?;
        let cancelled = self.required_status(OrderStatusName::Cancelled).await?;
        self.transition(order, cancelled, request.reason, None)
            .await
    }

    /// Applies a payment gateway outcome. A confirmed prepaid payment moves a
    /// pending order into `paid`; everything else only touches payment fields.
    pub async fn record_payment(
        &self,
        principal: &Principal,
        id: Uuid,
        event: PaymentEvent,
    ) -> Result<OrderView, AppError> {
        if !principal.can_record_payments() {
            return Err(AppError::Forbidden("service or admin role required".into()));
        }
        let mut order = self.load(id).await?;
        let current = self.current_status(&order).await?;

        // A prepaid order that already left `pending` keeps its status.
        let prepaid = order.payment_method != PaymentMethod::Cod;
        let enters_paid = prepaid && current.name == OrderStatusName::Pending;
        if event.outcome == PaymentStatus::Paid && enters_paid {
            if !order.payment_status.can_become(PaymentStatus::Paid) {
                return Err(PaymentError::NotAllowed {
                    from: order.payment_status,
                    to: PaymentStatus::Paid,
                }
                .into());
            }
            if event.transaction_id.is_some() {
                order.transaction_id = event.transaction_id;
            }
            let paid = self.required_status(OrderStatusName::Paid).await?;
            return self.transition(order, paid, None, None).await;
        }

        match event.outcome {
            PaymentStatus::Paid if current.name.is_terminal() => {
                return Err(TransitionError::Terminal(current.name).into());
            }
            PaymentStatus::Refunded
                if !matches!(
                    current.name,
                    OrderStatusName::Cancelled | OrderStatusName::Returned
                ) =>
            {
                return Err(AppError::BadRequest(format!(
                    "refunds need a cancelled or returned order, order is {}",
                    current.name
                )));
            }
            _ => {}
        }

        let expected = order.version;
        order.apply_payment(event.outcome, event.transaction_id, Utc::now())?;
        let order = self.repo.update_order(order, expected, false).await?;
        tracing::info!(
            order_id = %order.id,
            payment_status = %order.payment_status,
            "payment recorded"
        );
        Ok(OrderView {
            details: self.repo.order_details(order.id).await?,
            order,
            status: current,
        })
    }

    async fn transition(
        &self,
        mut order: Order,
        target: OrderStatus,
        cancelled_reason: Option<String>,
        note: Option<String>,
    ) -> Result<OrderView, AppError> {
        let current = self.current_status(&order).await?;
        let expected = order.version;
        if let Err(e) = order.transition_to(current.name, &target, cancelled_reason, Utc::now()) {
            tracing::warn!(
                order_id = %order.id,
                from = %current.name,
                to = %target.name,
                reason = %e,
                "transition rejected"
            );
            return Err(e.into());
        }
        if note.is_some() {
            order.note = note;
        }

        let restock = target.name == OrderStatusName::Cancelled;
        let order = self.repo.update_order(order, expected, restock).await?;
        tracing::info!(
            order_id = %order.id,
            from = %current.name,
            to = %target.name,
            restock,
            "order status changed"
        );
        Ok(OrderView {
            details: self.repo.order_details(order.id).await?,
            order,
            status: target,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Order, AppError> {
        self.repo
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    // Orders of other customers are reported as missing.
    async fn visible_order(&self, principal: &Principal, id: Uuid) -> Result<Order, AppError> {
        let order = self.load(id).await?;
        if !principal.can_access_order_of(order.user_id) {
            return Err(AppError::NotFound(format!("order {id} not found")));
        }
        Ok(order)
    }

    async fn view(&self, order: Order) -> Result<OrderView, AppError> {
        let status = self.current_status(&order).await?;
        let details = self.repo.order_details(order.id).await?;
        Ok(OrderView {
            order,
            status,
            details,
        })
    }

    async fn current_status(&self, order: &Order) -> Result<OrderStatus, AppError> {
        self.repo
            .get_status(order.order_status_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "order {} references unknown status {}",
                    order.id,
                    order.order_status_id
                ))
            })
    }

    async fn required_status(&self, name: OrderStatusName) -> Result<OrderStatus, AppError> {
        match self.repo.find_status_by_name(name).await? {
            Some(status) => Ok(status),
            None => {
                tracing::error!(
                    status = %name,
                    "order status missing from registry; was seeding skipped?"
                );
                Err(AppError::Internal(anyhow::anyhow!(
                    "order status {name} is not configured"
                )))
            }
        }
    }
}

fn order_owner(principal: &Principal, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    match (principal.role, requested) {
        (Role::Customer, Some(id)) if id != principal.id => Err(AppError::Forbidden(
            "customers can only place orders for themselves".into(),
        )),
        (Role::Customer, _) => Ok(principal.id),
        (_, Some(id)) => Ok(id),
        (_, None) => Err(AppError::BadRequest("userId is required".into())),
    }
}

// Client figures are never trusted; they must agree with ours exactly.
fn reconcile(checkout: &Checkout, totals: &OrderTotals) -> Result<(), AppError> {
    if let Some(declared) = checkout.declared_discount {
        if declared != totals.discount {
            return Err(AppError::BadRequest(format!(
                "declared discount {declared} does not match computed discount {}",
                totals.discount
            )));
        }
    }
    if let Some(declared) = checkout.declared_total {
        if declared != totals.total_price {
            return Err(AppError::BadRequest(format!(
                "declared totalPrice {declared} does not match computed total {}",
                totals.total_price
            )));
        }
    }
    Ok(())
}
