use chrono::{Duration, Utc};
use commerce_hex::application::order_service::OrderQuery;
use commerce_hex::application::CommerceServices;
use commerce_hex::domain::checkout::{Checkout, CheckoutItem};
use commerce_hex::domain::discount::NewDiscount;
use commerce_hex::domain::order::{
    PaymentEvent, PaymentMethod, PaymentStatus, Receiver, StatusUpdate,
};
use commerce_hex::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_hex::domain::principal::{Principal, Role};
use commerce_hex::domain::product::NewProduct;
use commerce_hex::errors::AppError;
use commerce_repo::memory::InMemoryRepo;
use uuid::Uuid;

fn status_id(statuses: &[OrderStatus], name: OrderStatusName) -> Uuid {
    statuses
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.id)
        .unwrap()
}

fn to(statuses: &[OrderStatus], name: OrderStatusName) -> StatusUpdate {
    StatusUpdate {
        order_status_id: status_id(statuses, name),
        note: None,
        cancelled_reason: None,
    }
}

// Checkout with a discount, prepaid confirmation, fulfilment, return.
#[tokio::test]
async fn discounted_prepaid_order_runs_to_returned() {
    let services = CommerceServices::new(InMemoryRepo::new());
    let statuses = services.statuses.seed_defaults().await.unwrap();

    let admin = Principal::new(Uuid::new_v4(), Role::Admin);
    let staff = Principal::new(Uuid::new_v4(), Role::Staff);
    let gateway = Principal::new(Uuid::new_v4(), Role::Service);
    let customer = Principal::customer(Uuid::new_v4());

    let now = Utc::now();
    services
        .discounts
        .create_discount(
            &admin,
            NewDiscount {
                code: "summer10".into(),
                discount_percent: 10,
                min_order_value: Some(100_000),
                max_discount_amount: Some(20_000),
                start_date: now - Duration::days(1),
                end_date: now + Duration::days(30),
            },
        )
        .await
        .unwrap();
    let blender = services
        .catalog
        .create_product(
            &admin,
            NewProduct {
                name: "Blender".into(),
                price: 150_000,
                stock_quantity: 4,
                images: vec!["blender.jpg".into()],
            },
        )
        .await
        .unwrap();

    let checkout = Checkout {
        user_id: None,
        items: vec![CheckoutItem {
            product_id: blender.id,
            quantity: 2,
            note: Some("gift wrap".into()),
        }],
        receiver: Receiver {
            receiver_name: "Mai".into(),
            receiver_phone: "0912345678".into(),
            receiver_address: "12 Ly Thuong Kiet".into(),
            receiver_email: Some("mai@example.com".into()),
        },
        payment_method: PaymentMethod::EWallet,
        shipping_fee: Some(25_000),
        discount_code: Some("Summer10".into()),
        declared_discount: Some(20_000),
        declared_total: Some(305_000),
        note: None,
    };
    let created = services
        .orders
        .create_order(&customer, checkout)
        .await
        .unwrap();
    let id = created.order.id;
    assert_eq!(created.order.subtotal, 300_000);
    assert_eq!(created.details[0].note.as_deref(), Some("gift wrap"));
    let stocked = services.catalog.get_product(blender.id).await.unwrap();
    assert_eq!(stocked.stock_quantity, 2);

    let paid = services
        .orders
        .record_payment(
            &gateway,
            id,
            PaymentEvent {
                outcome: PaymentStatus::Paid,
                transaction_id: Some("EW-77".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status.name, OrderStatusName::Paid);

    for step in [
        OrderStatusName::Confirmed,
        OrderStatusName::Processing,
        OrderStatusName::Shipped,
        OrderStatusName::Delivered,
        OrderStatusName::Returned,
    ] {
        let view = services
            .orders
            .update_status(&staff, id, to(&statuses, step))
            .await
            .unwrap();
        assert_eq!(view.status.name, step);
    }

    // Returned is absorbing for every target.
    for name in OrderStatusName::ALL {
        let res = services
            .orders
            .update_status(&staff, id, to(&statuses, name))
            .await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }

    let view = services.orders.get_order(&customer, id).await.unwrap();
    assert_eq!(view.status.name, OrderStatusName::Returned);
    assert!(view.order.delivered_at.is_some());
    assert_eq!(view.order.payment_status, PaymentStatus::Paid);
    // Returns do not restock.
    let stocked = services.catalog.get_product(blender.id).await.unwrap();
    assert_eq!(stocked.stock_quantity, 2);

    let mine = services
        .orders
        .list_orders(&customer, OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
}

#[tokio::test]
async fn staff_place_orders_on_behalf_of_customers() {
    let services = CommerceServices::new(InMemoryRepo::new());
    services.statuses.seed_defaults().await.unwrap();
    let admin = Principal::new(Uuid::new_v4(), Role::Admin);
    let staff = Principal::new(Uuid::new_v4(), Role::Staff);
    let customer_id = Uuid::new_v4();

    let lamp = services
        .catalog
        .create_product(
            &admin,
            NewProduct {
                name: "Lamp".into(),
                price: 80_000,
                stock_quantity: 1,
                images: vec![],
            },
        )
        .await
        .unwrap();

    let checkout = Checkout {
        user_id: Some(customer_id),
        items: vec![CheckoutItem {
            product_id: lamp.id,
            quantity: 1,
            note: None,
        }],
        receiver: Receiver {
            receiver_name: "Tuan".into(),
            receiver_phone: "0901234567".into(),
            receiver_address: "3 Hai Ba Trung".into(),
            receiver_email: None,
        },
        payment_method: PaymentMethod::Cod,
        shipping_fee: None,
        discount_code: None,
        declared_discount: None,
        declared_total: Some(80_000),
        note: Some("counter sale".into()),
    };
    let view = services
        .orders
        .create_order(&staff, checkout)
        .await
        .unwrap();
    assert_eq!(view.order.user_id, customer_id);
    assert!(view.details[0].product_image.is_none());

    let theirs = services
        .orders
        .get_order(&Principal::customer(customer_id), view.order.id)
        .await
        .unwrap();
    assert_eq!(theirs.order.note.as_deref(), Some("counter sale"));
}
