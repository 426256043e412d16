use std::time::Duration;

use anyhow::Context;
use commerce_types::domain::checkout::Checkout;
use commerce_types::domain::discount::{
    ApplyDiscountRequest, DiscountCode, DiscountPatch, DiscountQuote, NewDiscount,
};
use commerce_types::domain::order::{
    CancelRequest, ListResult, Order, OrderView, PaymentEvent, StatusUpdate,
};
use commerce_types::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_types::domain::principal::Principal;
use commerce_types::domain::product::{NewProduct, Product};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the authenticated caller, as set by the gateway.
pub const USER_HEADER: &str = "x-user";

#[derive(Clone)]
pub struct CommerceClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

#[derive(Clone)]
pub struct CommerceClient {
    base: Url,
    client: reqwest::Client,
}

/// Query for `GET /orders`.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatusName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

async fn read<T: DeserializeOwned>(req: RequestBuilder) -> anyhow::Result<T> {
    let res = req.send().await?.error_for_status()?;
    tracing::debug!(status = %res.status(), url = %res.url(), "commerce api response");
    Ok(res.json().await?)
}

impl CommerceClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<CommerceClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(CommerceClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    pub async fn list_order_statuses(&self) -> anyhow::Result<Vec<OrderStatus>> {
        read(self.client.get(self.url("order-statuses")?)).await
    }

    pub async fn create_discount(&self, req: &NewDiscount) -> anyhow::Result<DiscountCode> {
        read(self.client.post(self.url("discounts")?).json(req)).await
    }

    pub async fn list_discounts(&self) -> anyhow::Result<Vec<DiscountCode>> {
        read(self.client.get(self.url("discounts")?)).await
    }

    pub async fn active_discounts(&self) -> anyhow::Result<Vec<DiscountCode>> {
        read(self.client.get(self.url("discounts/active")?)).await
    }

    pub async fn apply_discount(
        &self,
        code: &str,
        order_total: i64,
    ) -> anyhow::Result<DiscountQuote> {
        let body = ApplyDiscountRequest {
            code: code.to_owned(),
            order_total,
        };
        read(self.client.post(self.url("discounts/apply")?).json(&body)).await
    }

    pub async fn get_discount(&self, id: Uuid) -> anyhow::Result<DiscountCode> {
        read(self.client.get(self.url(&format!("discounts/{id}"))?)).await
    }

    pub async fn update_discount(
        &self,
        id: Uuid,
        patch: &DiscountPatch,
    ) -> anyhow::Result<DiscountCode> {
        read(
            self.client
                .patch(self.url(&format!("discounts/{id}"))?)
                .json(patch),
        )
        .await
    }

    pub async fn deactivate_discount(&self, id: Uuid) -> anyhow::Result<DiscountCode> {
        read(self.client.delete(self.url(&format!("discounts/{id}"))?)).await
    }

    pub async fn create_product(&self, req: &NewProduct) -> anyhow::Result<Product> {
        read(self.client.post(self.url("products")?).json(req)).await
    }

    pub async fn list_products(&self) -> anyhow::Result<Vec<Product>> {
        read(self.client.get(self.url("products")?)).await
    }

    pub async fn get_product(&self, id: Uuid) -> anyhow::Result<Product> {
        read(self.client.get(self.url(&format!("products/{id}"))?)).await
    }

    pub async fn create_order(&self, checkout: &Checkout) -> anyhow::Result<OrderView> {
        read(self.client.post(self.url("orders")?).json(checkout)).await
    }

    pub async fn list_orders(
        &self,
        params: &ListOrdersParams,
    ) -> anyhow::Result<ListResult<Order>> {
        read(self.client.get(self.url("orders")?).query(params)).await
    }

    pub async fn get_order(&self, id: Uuid) -> anyhow::Result<OrderView> {
        read(self.client.get(self.url(&format!("orders/{id}"))?)).await
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        update: &StatusUpdate,
    ) -> anyhow::Result<OrderView> {
        read(
            self.client
                .put(self.url(&format!("orders/{id}/status"))?)
                .json(update),
        )
        .await
    }

    pub async fn cancel_order(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> anyhow::Result<OrderView> {
        read(
            self.client
                .post(self.url(&format!("orders/{id}/cancel"))?)
                .json(&CancelRequest { reason }),
        )
        .await
    }

    pub async fn record_payment(
        &self,
        id: Uuid,
        event: &PaymentEvent,
    ) -> anyhow::Result<OrderView> {
        read(
            self.client
                .post(self.url(&format!("orders/{id}/payment"))?)
                .json(event),
        )
        .await
    }
}

impl CommerceClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Sends `principal` as the `x-user` header on every request.
    pub fn with_principal(self, principal: &Principal) -> anyhow::Result<Self> {
        let raw = serde_json::to_string(principal).context("encode principal")?;
        self.with_header(USER_HEADER, raw)
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<CommerceClient> {
        if let Some(client) = self.client {
            return Ok(CommerceClient {
                base: self.base,
                client,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(CommerceClient {
            base: self.base,
            client,
        })
    }
}
