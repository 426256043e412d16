///  To run :
///  cargo r --example client_example
use commerce_client::{CommerceClient, ListOrdersParams};
use commerce_hex::application::CommerceServices;
use commerce_hex::inbound::http::{HttpServer, HttpServerConfig};
use commerce_repo::build_repo;
use commerce_types::domain::checkout::{Checkout, CheckoutItem};
use commerce_types::domain::order::{PaymentEvent, PaymentMethod, PaymentStatus, Receiver};
use commerce_types::domain::order_status::OrderStatusName;
use commerce_types::domain::principal::{Principal, Role};
use commerce_types::domain::product::NewProduct;
use reqwest::StatusCode;
use tempfile::tempdir;
use uuid::Uuid;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    // Use a temp file-backed SQLite DB so multiple connections see the same data.
    let tmp = tempdir()?;
    let db_path = tmp.path().join("commerce.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let repo = build_repo(Some(&db_url)).await?;
    let services = CommerceServices::new(repo);
    services.statuses.seed_defaults().await?;
    let server = HttpServer::new(
        services,
        HttpServerConfig {
            port: port.to_string(),
        },
    );

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let as_role = |role: Role| -> anyhow::Result<CommerceClient> {
        CommerceClient::builder(&addr)?
            .with_principal(&Principal::new(Uuid::new_v4(), role))?
            .build()
    };
    let admin = as_role(Role::Admin)?;
    let customer = as_role(Role::Customer)?;
    let gateway = as_role(Role::Service)?;

    let kettle = admin
        .create_product(&NewProduct {
            name: "Kettle".into(),
            price: 320_000,
            stock_quantity: 2,
            images: vec!["kettle.jpg".into()],
        })
        .await?;
    println!(
        "Created product id={} stock={}",
        kettle.id, kettle.stock_quantity
    );

    let checkout = Checkout {
        user_id: None,
        items: vec![CheckoutItem {
            product_id: kettle.id,
            quantity: 2,
            note: None,
        }],
        receiver: Receiver {
            receiver_name: "Example".into(),
            receiver_phone: "0900000001".into(),
            receiver_address: "1 Example Street".into(),
            receiver_email: Some("example@example.com".into()),
        },
        payment_method: PaymentMethod::Vnpay,
        shipping_fee: Some(20_000),
        discount_code: None,
        declared_discount: None,
        declared_total: Some(660_000),
        note: None,
    };
    let created = customer.create_order(&checkout).await?;
    println!(
        "Created order {} total={} status={}",
        created.order.order_number, created.order.total_price, created.status.name
    );

    // Stock is gone now; a second checkout must be refused.
    match customer.create_order(&checkout).await {
        Ok(_) => anyhow::bail!("second checkout should have been refused"),
        Err(err) => {
            let status = err
                .downcast_ref::<reqwest::Error>()
                .and_then(|e| e.status());
            assert_eq!(status, Some(StatusCode::BAD_REQUEST));
            println!("Second checkout refused: insufficient stock");
        }
    }

    let paid = gateway
        .record_payment(
            created.order.id,
            &PaymentEvent {
                outcome: PaymentStatus::Paid,
                transaction_id: Some("VNP-0001".into()),
            },
        )
        .await?;
    println!("Payment recorded, order status={}", paid.status.name);
    assert_eq!(paid.status.name, OrderStatusName::Paid);

    let cancelled = customer
        .cancel_order(created.order.id, Some("ordered twice".into()))
        .await?;
    println!("Cancelled, status={}", cancelled.status.name);

    let stock = admin.get_product(kettle.id).await?.stock_quantity;
    println!("Stock after cancel={stock}");

    let mine = customer.list_orders(&ListOrdersParams::default()).await?;
    println!("Customer sees {} order(s)", mine.total);

    handle.abort();
    Ok(())
}
