use std::collections::BTreeMap;

use asupersync::runtime::RuntimeBuilder;
use datactx::memory::MemoryDocumentStore;
use datactx::prelude::*;

#[derive(Debug, Default, Clone, PartialEq, Entity)]
#[entity(table = "orders")]
struct Order {
    #[entity(key, alias = "OrderNo")]
    number: i64,
    #[entity(alias = "Customer")]
    customer: String,
    note: Option<String>,
}

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

fn order(number: i64, customer: &str) -> Order {
    Order {
        number,
        customer: customer.to_string(),
        note: None,
    }
}

fn context(store: &MemoryDocumentStore) -> DocumentContext<MemoryDocumentStore> {
    let settings: BTreeMap<String, String> =
        [("CollectionPrefix".to_string(), "shop_".to_string())].into();
    DocumentContext::from_settings(store.clone(), &settings)
}

#[test]
fn fan_out_delete_reports_only_the_count() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let store = MemoryDocumentStore::new();
    let mut ctx = context(&store);

    rt.block_on(async {
        let orders = [order(1, "ann"), order(2, "bo"), order(3, "cy")];
        let inserted = unwrap_outcome(ctx.insert_all(&cx, &orders).await);
        assert!(inserted.success());
        assert_eq!(inserted.payload(), Some(&3));

        store.reject_key("2", 503);
        let keys = [Value::BigInt(1), Value::BigInt(2), Value::BigInt(3)];
        let deleted = unwrap_outcome(ctx.delete_all::<Order>(&cx, &keys).await);
        assert!(!deleted.success());
        assert_eq!(deleted.payload(), Some(&2));
    });
    assert_eq!(store.len("shop_orders"), 1);
}

#[test]
fn faulted_requests_are_counted_as_failures() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let store = MemoryDocumentStore::new();
    let mut ctx = context(&store);
    store.fault_key("2");

    rt.block_on(async {
        let orders = [order(1, "ann"), order(2, "bo")];
        let inserted = unwrap_outcome(ctx.insert_all(&cx, &orders).await);
        assert!(!inserted.success());
        assert_eq!(inserted.payload(), Some(&1));
    });
    assert_eq!(store.request_count(), 2);
}

#[test]
fn single_operations_follow_backend_status() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let store = MemoryDocumentStore::new();
    let mut ctx = context(&store);

    rt.block_on(async {
        assert!(unwrap_outcome(ctx.insert(&cx, &order(7, "ann")).await).success());
        assert!(!unwrap_outcome(ctx.insert(&cx, &order(7, "dup")).await).success());

        let mut changed = order(7, "ann");
        changed.note = Some("gift".to_string());
        assert!(unwrap_outcome(ctx.update(&cx, &changed).await).success());
        assert!(!unwrap_outcome(ctx.update(&cx, &order(8, "nobody")).await).success());

        let found = unwrap_outcome(ctx.select::<Order>(&cx, Value::BigInt(7)).await);
        assert_eq!(found.into_payload(), Some(changed.clone()));

        let all = unwrap_outcome(ctx.select_all::<Order>(&cx).await);
        assert_eq!(all.into_payload(), Some(vec![changed.clone()]));

        assert!(unwrap_outcome(ctx.delete(&cx, &changed).await).success());
        let missing = unwrap_outcome(ctx.select::<Order>(&cx, Value::BigInt(7)).await);
        assert!(!missing.success());
        assert_eq!(missing.message(), "not found");
    });
    assert!(store.is_empty("shop_orders"));
}

#[test]
fn documents_use_storage_names() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let store = MemoryDocumentStore::new();
    let mut ctx = context(&store);

    rt.block_on(async {
        unwrap_outcome(ctx.insert(&cx, &order(5, "ann")).await);
    });

    let document = store.document("shop_orders", "5").expect("stored document");
    assert_eq!(document["OrderNo"], serde_json::json!(5));
    assert_eq!(document["Customer"], serde_json::json!("ann"));
    assert_eq!(document["note"], serde_json::Value::Null);
}

#[test]
fn keys_of_the_wrong_kind_are_faults() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let store = MemoryDocumentStore::new();
    let mut ctx = context(&store);

    rt.block_on(async {
        let outcome = ctx.delete_by_key::<Order>(&cx, Value::from("5")).await;
        assert!(matches!(outcome, Outcome::Err(Error::Mapping(_))));
        let outcome = ctx.delete_all::<Order>(&cx, &[]).await;
        assert!(matches!(outcome, Outcome::Err(Error::MalformedCommand(_))));
    });
    assert_eq!(store.request_count(), 0);
}
