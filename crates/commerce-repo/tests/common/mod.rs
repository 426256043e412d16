//! Adapter-agnostic scenarios run against every repository backend.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use commerce_types::domain::discount::{DiscountCode, NewDiscount};
use commerce_types::domain::order::{
    Order, OrderDetail, OrderFilter, OrderTotals, PaymentMethod, Receiver,
};
use commerce_types::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_types::domain::product::{NewProduct, Product};
use commerce_types::ports::{CommerceRepository, RepoError};
use uuid::Uuid;

pub async fn product<R: CommerceRepository>(repo: &R, stock: i64) -> Product {
    let p = Product::new(NewProduct {
        name: format!("Widget {}", Uuid::new_v4()),
        price: 500,
        stock_quantity: stock,
        images: vec!["w.png".into()],
    })
    .unwrap();
    repo.create_product(p).await.unwrap()
}

pub async fn seed<R: CommerceRepository>(repo: &R) {
    for s in OrderStatus::seed() {
        repo.upsert_status(s).await.unwrap();
    }
}

pub async fn draft<R: CommerceRepository>(
    repo: &R,
    lines: &[(&Product, u32)],
) -> (Order, Vec<OrderDetail>) {
    let pending = repo
        .find_status_by_name(OrderStatusName::Pending)
        .await
        .unwrap()
        .unwrap();
    let order_id = Uuid::new_v4();
    let details: Vec<OrderDetail> = lines
        .iter()
        .map(|(p, q)| OrderDetail::snapshot(order_id, p, *q, None))
        .collect::<Result<_, _>>()
        .unwrap();
    let totals = OrderTotals::compute(&details, 0, 0).unwrap();
    let mut order = Order::new(
        Uuid::new_v4(),
        pending.id,
        PaymentMethod::Cod,
        Receiver {
            receiver_name: "Test".into(),
            receiver_phone: "0900".into(),
            receiver_address: "Somewhere".into(),
            receiver_email: None,
        },
        totals,
        None,
        None,
    );
    order.id = order_id;
    (order, details)
}

pub async fn stock<R: CommerceRepository>(repo: &R, id: Uuid) -> i64 {
    repo.get_product(id).await.unwrap().unwrap().stock_quantity
}

pub async fn placing_decrements_stock_and_numbers_orders<R: CommerceRepository>(repo: &R) {
    seed(repo).await;
    let p = product(repo, 10).await;

    let (order, details) = draft(repo, &[(&p, 3)]).await;
    let first = repo.place_order(order, details).await.unwrap();
    let (order, details) = draft(repo, &[(&p, 2)]).await;
    let second = repo.place_order(order, details).await.unwrap();

    assert_eq!(stock(repo, p.id).await, 5);
    let day = first.created_at.format("%Y%m%d").to_string();
    assert_eq!(first.order_number, format!("ORD{day}0001"));
    assert_eq!(second.order_number, format!("ORD{day}0002"));

    let fetched = repo.get_order(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.order_number, first.order_number);
    let lines = repo.order_details(first.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
    assert_eq!(lines[0].total_price, 1500);
}

pub async fn insufficient_stock_persists_nothing<R: CommerceRepository>(repo: &R) {
    seed(repo).await;
    let plenty = product(repo, 100).await;
    let scarce = product(repo, 3).await;

    let (order, details) = draft(repo, &[(&plenty, 1), (&scarce, 5)]).await;
    let id = order.id;
    let err = repo.place_order(order, details).await.unwrap_err();
    assert!(matches!(err, RepoError::InsufficientStock(p) if p == scarce.id));

    assert!(repo.get_order(id).await.unwrap().is_none());
    assert!(repo.order_details(id).await.unwrap().is_empty());
    assert_eq!(stock(repo, plenty.id).await, 100);
    assert_eq!(stock(repo, scarce.id).await, 3);
}

pub async fn missing_product_is_reported<R: CommerceRepository>(repo: &R) {
    seed(repo).await;
    let mut ghost = product(repo, 1).await;
    ghost.id = Uuid::new_v4();
    let (order, details) = draft(repo, &[(&ghost, 1)]).await;
    let err = repo.place_order(order, details).await.unwrap_err();
    assert!(matches!(err, RepoError::ProductNotFound(id) if id == ghost.id));
}

pub async fn concurrent_orders_never_oversell<R: CommerceRepository + Clone>(repo: &R) {
    seed(repo).await;
    let p = product(repo, 5).await;

    let (o1, d1) = draft(repo, &[(&p, 3)]).await;
    let (o2, d2) = draft(repo, &[(&p, 3)]).await;
    let (r1, r2) = (repo.clone(), repo.clone());
    let a = tokio::spawn(async move { r1.place_order(o1, d1).await });
    let b = tokio::spawn(async move { r2.place_order(o2, d2).await });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(RepoError::InsufficientStock(_)))));
    assert_eq!(stock(repo, p.id).await, 2);
}

pub async fn stale_versions_are_rejected_and_cancel_restocks<R: CommerceRepository>(repo: &R) {
    seed(repo).await;
    let p = product(repo, 4).await;
    let (order, details) = draft(repo, &[(&p, 4)]).await;
    let placed = repo.place_order(order, details).await.unwrap();
    assert_eq!(stock(repo, p.id).await, 0);

    let cancelled = repo
        .find_status_by_name(OrderStatusName::Cancelled)
        .await
        .unwrap()
        .unwrap();
    let mut change = placed.clone();
    change
        .transition_to(
            OrderStatusName::Pending,
            &cancelled,
            Some("dup".into()),
            Utc::now(),
        )
        .unwrap();

    let saved = repo
        .update_order(change.clone(), placed.version, true)
        .await
        .unwrap();
    assert_eq!(saved.version, placed.version + 1);
    assert_eq!(stock(repo, p.id).await, 4);

    // a second writer that read the same version loses
    let err = repo
        .update_order(change, placed.version, true)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::StaleOrder(_)));
    assert_eq!(stock(repo, p.id).await, 4);

    let stored = repo.get_order(placed.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status_id, cancelled.id);
    assert_eq!(stored.cancelled_reason.as_deref(), Some("dup"));
    assert!(stored.cancelled_at.is_some());
}

pub async fn list_filters_and_paginates<R: CommerceRepository>(repo: &R) {
    seed(repo).await;
    let p = product(repo, 100).await;
    let (first, details) = draft(repo, &[(&p, 1)]).await;
    let owner = first.user_id;
    repo.place_order(first, details).await.unwrap();
    for _ in 0..4 {
        let (mut o, d) = draft(repo, &[(&p, 1)]).await;
        o.user_id = owner;
        repo.place_order(o, d).await.unwrap();
    }
    let (other, d) = draft(repo, &[(&p, 1)]).await;
    repo.place_order(other, d).await.unwrap();

    let page = repo
        .list_orders(OrderFilter {
            user_id: Some(owner),
            order_status_id: None,
            page: 2,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|o| o.user_id == owner));

    let all = repo
        .list_orders(OrderFilter {
            page: 1,
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.total, 6);
    assert!(all
        .items
        .windows(2)
        .all(|w| w[0].created_at >= w[1].created_at));
}

pub async fn discount_codes_are_unique<R: CommerceRepository>(repo: &R) {
    let now = Utc::now();
    let new = |code: &str| {
        DiscountCode::new(NewDiscount {
            code: code.into(),
            discount_percent: 10,
            min_order_value: None,
            max_discount_amount: None,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
        })
        .unwrap()
    };

    let first = repo.create_discount(new("summer10")).await.unwrap();
    let dup = repo.create_discount(new("SUMMER10")).await.unwrap_err();
    assert!(matches!(dup, RepoError::Duplicate(_)));

    let other = repo.create_discount(new("winter")).await.unwrap();
    let mut renamed = other.clone();
    renamed.code = first.code.clone();
    assert!(matches!(
        repo.update_discount(renamed).await,
        Err(RepoError::Duplicate(_))
    ));

    // same code on itself is not a clash
    let mut same = first.clone();
    same.min_order_value = 7;
    let saved = repo.update_discount(same).await.unwrap().unwrap();
    assert_eq!(saved.min_order_value, 7);

    let found = repo
        .find_discount_by_code("SUMMER10")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.min_order_value, 7);

    let mut off = found.clone();
    off.deactivate();
    repo.update_discount(off).await.unwrap();
    let active = repo.list_active_discounts(now).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].code, "WINTER");
    assert_eq!(repo.list_discounts().await.unwrap().len(), 2);

    let mut unknown = new("ghost");
    unknown.id = Uuid::new_v4();
    assert!(repo.update_discount(unknown).await.unwrap().is_none());
}

pub async fn status_seeding_is_idempotent<R: CommerceRepository>(repo: &R) {
    seed(repo).await;
    let before = repo.list_statuses().await.unwrap();
    seed(repo).await;
    let after = repo.list_statuses().await.unwrap();
    assert_eq!(before.len(), 8);
    assert_eq!(before, after);
    assert_eq!(after[0].name, OrderStatusName::Pending);
    assert!(after.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));

    let mut recolored = OrderStatus::with_defaults(OrderStatusName::Shipped);
    recolored.color = "#000000".into();
    let stored = repo.upsert_status(recolored).await.unwrap();
    let original = before
        .iter()
        .find(|s| s.name == OrderStatusName::Shipped)
        .unwrap();
    assert_eq!(stored.id, original.id);
    assert_eq!(stored.color, "#000000");
}
