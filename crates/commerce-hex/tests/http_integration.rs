use commerce_hex::application::CommerceServices;
use commerce_hex::domain::discount::DiscountQuote;
use commerce_hex::domain::order::{ListResult, Order, OrderView};
use commerce_hex::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_hex::domain::product::Product;
use commerce_hex::inbound::http::{HttpServer, HttpServerConfig, USER_HEADER};
use commerce_repo::build_repo;
use serde_json::{json, Value};
use uuid::Uuid;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn user(role: &str) -> String {
    json!({ "id": Uuid::new_v4(), "role": role }).to_string()
}

async fn start() -> (String, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let config = HttpServerConfig {
        port: port.to_string(),
    };
    let repo = build_repo(None).await.expect("build repo");
    let services = CommerceServices::new(repo);
    services.statuses.seed_defaults().await.expect("seed");
    let server = HttpServer::new(services, config);

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    // Give the server a moment to start.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    (format!("http://127.0.0.1:{}", port), handle)
}

#[tokio::test]
async fn checkout_and_lifecycle_over_http() {
    let (addr, handle) = start().await;
    let client = reqwest::Client::new();
    let admin = user("admin");
    let staff = user("staff");
    let customer = user("customer");

    let res = client
        .post(format!("{}/products", addr))
        .header(USER_HEADER, &admin)
        .json(&json!({
            "name": "Rice cooker",
            "price": 100000,
            "stockQuantity": 3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let product: Product = res.json().await.unwrap();

    let statuses: Vec<OrderStatus> = client
        .get(format!("{}/order-statuses", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(statuses.len(), 8);
    let id_of = |name: OrderStatusName| statuses.iter().find(|s| s.name == name).unwrap().id;

    let res = client
        .post(format!("{}/orders", addr))
        .header(USER_HEADER, &customer)
        .json(&json!({
            "items": [{ "productId": product.id, "quantity": 2 }],
            "receiverName": "Hoa",
            "receiverPhone": "0933333333",
            "receiverAddress": "9 Pasteur",
            "paymentMethod": "cod",
            "shippingFee": 15000,
            "totalPrice": 215000
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let created: OrderView = res.json().await.unwrap();
    assert_eq!(created.status.name, OrderStatusName::Pending);
    assert_eq!(created.order.total_price, 215_000);
    let id = created.order.id;

    let res = client
        .put(format!("{}/orders/{}/status", addr, id))
        .header(USER_HEADER, &staff)
        .json(&json!({
            "orderStatusId": id_of(OrderStatusName::Processing)
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "bad_request");

    let res = client
        .put(format!("{}/orders/{}/status", addr, id))
        .header(USER_HEADER, &staff)
        .json(&json!({
            "orderStatusId": id_of(OrderStatusName::Confirmed),
            "note": "call first"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let confirmed: OrderView = res.json().await.unwrap();
    assert_eq!(confirmed.status.name, OrderStatusName::Confirmed);
    assert_eq!(confirmed.order.note.as_deref(), Some("call first"));

    let list: ListResult<Order> = client
        .get(format!("{}/orders?status=confirmed&page=1&limit=10", addr))
        .header(USER_HEADER, &staff)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.items[0].id, id);

    // Status filters must name a known status.
    let res = client
        .get(format!("{}/orders?status=lost", addr))
        .header(USER_HEADER, &staff)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    // Confirmed orders can no longer be cancelled.
    let res = client
        .post(format!("{}/orders/{}/cancel", addr, id))
        .header(USER_HEADER, &staff)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn discounts_over_http() {
    let (addr, handle) = start().await;
    let client = reqwest::Client::new();
    let admin = user("admin");
    let now = chrono::Utc::now();

    let res = client
        .post(format!("{}/discounts", addr))
        .header(USER_HEADER, &admin)
        .json(&json!({
            "code": "SUMMER10",
            "discountPercent": 10,
            "minOrderValue": 100000,
            "maxDiscountAmount": 20000,
            "startDate": now - chrono::Duration::days(1),
            "endDate": now + chrono::Duration::days(1)
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();

    let quote: DiscountQuote = client
        .post(format!("{}/discounts/apply", addr))
        .json(&json!({ "code": "summer10", "orderTotal": 500000 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote.discount_amount, 20_000);
    assert_eq!(quote.original_discount_amount, 50_000);
    assert_eq!(quote.total_after_discount, 480_000);

    let res = client
        .post(format!("{}/discounts/apply", addr))
        .json(&json!({ "code": "SUMMER10", "orderTotal": 50000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let discount_url = format!("{addr}/discounts/{}", created["id"].as_str().unwrap());
    let res = client
        .patch(&discount_url)
        .header(USER_HEADER, &admin)
        .json(&json!({ "discountPercent": 50 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let res = client
        .delete(&discount_url)
        .header(USER_HEADER, &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let active: Vec<Value> = client
        .get(format!("{}/discounts/active", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(active.is_empty());

    handle.abort();
}

#[tokio::test]
async fn auth_and_not_found_paths() {
    let (addr, handle) = start().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/orders", addr)).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/discounts", addr))
        .header(USER_HEADER, user("customer"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/orders/{}", addr, Uuid::new_v4()))
        .header(USER_HEADER, user("staff"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/products/not-a-uuid", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{}/orders", addr))
        .header(USER_HEADER, user("customer"))
        .json(&json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    handle.abort();
}
