#![cfg(feature = "rusqlite")]

use common::{Customer, PurchaseOrder, ids, setup_session};
use graphfetch::prelude::*;

mod common;

#[test]
fn criteria_tree_filters_through_sub_criteria() {
    let mut session = setup_session(3, 2, 2);
    let mut dao = GenericDao::<_, Customer>::new(&mut session);

    let mut tree = SearchCriteria::new("Customer");
    tree.add_criterion(criterion::eq("region", "EU"));
    tree.add_order(Order::asc("name"));
    assert!(tree.add_criterion_at(criterion::eq("status", "OPEN"), "orders"));
    assert!(tree.add_criterion_at(criterion::ge("quantity", 2), "orders.items"));

    let rows = dao.search_by_criteria_tree(Some(&tree), -1, 0).expect("search");
    assert_eq!(ids(&rows), vec![Key::Integer(1), Key::Integer(3)]);
    assert_eq!(dao.search_by_criteria_tree_count(Some(&tree)).expect("count"), 2);
}

#[test]
fn criteria_tree_count_ignores_orders() {
    let mut session = setup_session(3, 2, 2);
    let mut dao = GenericDao::<_, Customer>::new(&mut session);

    let mut tree = SearchCriteria::from_path("Customer.orders");
    tree.add_order_at(Order::desc("id"), "orders");
    tree.sub_criteria_or_insert("orders").set_join_type(JoinKind::Left);

    assert_eq!(dao.search_by_criteria_tree_count(Some(&tree)).expect("count"), 3);
    assert_eq!(dao.search_by_criteria_tree_count(None).expect("count"), 3);
}

#[test]
fn criteria_tree_pagination() {
    let mut session = setup_session(5, 0, 0);
    let mut dao = GenericDao::<_, Customer>::new(&mut session);

    let mut tree = SearchCriteria::new("Customer");
    tree.add_order(Order::desc("name"));

    let page = dao.search_by_criteria_tree(Some(&tree), 1, 2).expect("search");
    assert_eq!(ids(&page), vec![Key::Integer(4), Key::Integer(3)]);

    let unbounded = dao.search_by_criteria_tree(Some(&tree), 3, 0).expect("search");
    assert_eq!(ids(&unbounded), vec![Key::Integer(2), Key::Integer(1)]);

    let everything = dao.search_by_criteria_tree(None, -1, -1).expect("search");
    assert_eq!(everything.len(), 5);
}

#[test]
fn property_criteria_scope_to_associations() {
    let mut session = setup_session(3, 2, 0);
    let mut dao = GenericDao::<_, PurchaseOrder>::new(&mut session);

    let entries = [
        PropertyCriterion::root(criterion::eq("status", "OPEN")),
        PropertyCriterion::on("customer", criterion::eq("region", "EU")),
    ];
    let orders = [PropertyOrder::on("customer", Order::desc("name"))];

    let rows = dao
        .search_by_property_criteria(&entries, &orders, -1, -1)
        .expect("search");
    assert_eq!(rows.iter().map(|o| o.customer_id).collect::<Vec<_>>(), vec![3, 1]);
    assert!(rows.iter().all(|o| o.status == "OPEN"));

    let page = dao
        .search_by_property_criteria(&entries, &orders, 0, 1)
        .expect("search");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].customer_id, 3);

    // pagination needs both bounds
    let ignored = dao
        .search_by_property_criteria(&entries, &orders, 1, 0)
        .expect("search");
    assert_eq!(ignored.len(), 2);
}

#[test]
fn current_page_rows_filters_by_equality() {
    let mut session = setup_session(5, 0, 0);
    let mut dao = GenericDao::<_, Customer>::new(&mut session);

    let rows = dao
        .current_page_rows(0, 10, Some("name"), false, &[("region", Value::from("EU"))])
        .expect("page");
    assert_eq!(ids(&rows), vec![Key::Integer(5), Key::Integer(3), Key::Integer(1)]);

    let rows = dao
        .current_page_rows(1, 1, Some("id"), true, &[])
        .expect("page");
    assert_eq!(ids(&rows), vec![Key::Integer(2)]);
}

#[test]
fn single_entity_access() {
    let mut session = setup_session(3, 1, 0);
    let mut dao = GenericDao::<_, Customer>::new(&mut session);

    let customer = dao.get(2_i64).expect("customer 2");
    assert_eq!(customer.name, "customer-02");
    assert!(dao.exists(3_i64).expect("exists"));
    assert!(!dao.exists(9_i64).expect("exists"));
    assert!(matches!(
        dao.get(9_i64),
        Err(GraphFetchError::NotFound { entity: "Customer", .. })
    ));

    assert_eq!(dao.get_all().expect("all").len(), 3);
    assert_eq!(dao.get_all_distinct().expect("distinct").len(), 3);
    dao.clear_cache();
    assert_eq!(dao.row_count(&[]).expect("count"), 3);
}
