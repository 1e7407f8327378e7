mod common;

use common::{owner, seed};
use metadata_store::{
    config::SearchConfig,
    models::{DataType, OwnerIdentity},
    search::{ConstraintGroup, PageInfo, PageRequest, SearchEngine, SortField, SortOrder},
    state::{AttributeStore, InMemoryStore, RowScope, SledStore},
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn engine(store: Arc<dyn AttributeStore>) -> SearchEngine {
    SearchEngine::new(store, SearchConfig::default())
}

fn group(key: &str) -> ConstraintGroup {
    ConstraintGroup::new().with_key(key)
}

/// Twelve owners sharing `status=active`, every third one also `vip=true`
async fn seed_twelve(store: &dyn AttributeStore, tenant: Uuid) -> Vec<OwnerIdentity> {
    let mut owners = Vec::new();
    for i in 0..12 {
        let thing = owner(tenant, "Thing");
        seed(store, &thing, &[("status", DataType::String, "active")]).await;
        if i % 3 == 0 {
            seed(store, &thing, &[("vip", DataType::Boolean, "true")]).await;
        }
        owners.push(thing);
    }
    owners
}

async fn check_single_group_narrows(store: Arc<dyn AttributeStore>) {
    let tenant = Uuid::new_v4();
    let a = owner(tenant, "Thing");
    let b = owner(tenant, "Thing");
    let c = owner(tenant, "Thing");
    seed(&*store, &a, &[("level", DataType::Integer, "1")]).await;
    seed(&*store, &b, &[("level", DataType::Integer, "2")]).await;
    seed(&*store, &c, &[("level", DataType::String, "1")]).await;

    let engine = engine(store);
    let scope = RowScope::owner_type(tenant, "Thing");

    let by_key_and_type = group("level").with_data_type(DataType::Integer);
    assert_eq!(engine.count(&scope, &[by_key_and_type.clone()]).await.unwrap(), 2);

    let narrowed = by_key_and_type.with_raw_value("1");
    let page = engine
        .search(&scope, &[narrowed], &PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].owner, a);
    assert_eq!(page.data[0].attributes[0].value, json!(1));
}

async fn check_pagination(store: Arc<dyn AttributeStore>) {
    let tenant = Uuid::new_v4();
    let owners = seed_twelve(&*store, tenant).await;
    let engine = engine(store);
    let scope = RowScope::tenant(tenant);
    let groups = [group("status")];

    let first = engine
        .search(&scope, &groups, &PageRequest::new(1, 3))
        .await
        .unwrap();
    assert_eq!(first.data.len(), 3);
    assert_eq!(
        first.page,
        PageInfo {
            size: 3,
            number: 1,
            total_pages: 4,
            total_elements: 12,
        }
    );
    let first_owners: Vec<_> = first.data.iter().map(|m| m.owner.clone()).collect();
    assert_eq!(first_owners, owners[..3].to_vec());

    let last = engine
        .search(&scope, &groups, &PageRequest::new(4, 3))
        .await
        .unwrap();
    assert_eq!(last.data[2].owner, owners[11]);

    let beyond = engine
        .search(&scope, &groups, &PageRequest::new(5, 3))
        .await
        .unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.page.total_elements, 12);

    let zero = engine
        .search(&scope, &groups, &PageRequest::new(0, 3))
        .await
        .unwrap();
    assert_eq!(zero.page, PageInfo::default());
}

async fn check_intersection(store: Arc<dyn AttributeStore>) {
    let tenant = Uuid::new_v4();
    let owners = seed_twelve(&*store, tenant).await;
    let engine = engine(store);
    let scope = RowScope::tenant(tenant);

    let groups = [
        group("status").with_raw_value("active"),
        group("vip").with_data_type(DataType::Boolean),
    ];
    let page = engine
        .search(&scope, &groups, &PageRequest::new(1, 20))
        .await
        .unwrap();

    let expected: Vec<_> = owners.iter().step_by(3).cloned().collect();
    let found: Vec<_> = page.data.iter().map(|m| m.owner.clone()).collect();
    assert_eq!(found, expected);
    assert!(page.data.iter().all(|m| m.attributes.len() == 2));
    assert_eq!(engine.count(&scope, &groups).await.unwrap(), 4);

    let disjoint = [group("vip"), group("status").with_raw_value("retired")];
    assert_eq!(engine.count(&scope, &disjoint).await.unwrap(), 0);
}

#[tokio::test]
async fn test_single_group_narrows_inmemory() {
    check_single_group_narrows(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test]
async fn test_single_group_narrows_sled() {
    let temp_dir = TempDir::new().unwrap();
    check_single_group_narrows(Arc::new(SledStore::new(temp_dir.path()).unwrap())).await;
}

#[tokio::test]
async fn test_pagination_inmemory() {
    check_pagination(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test]
async fn test_pagination_sled() {
    let temp_dir = TempDir::new().unwrap();
    check_pagination(Arc::new(SledStore::new(temp_dir.path()).unwrap())).await;
}

#[tokio::test]
async fn test_intersection_inmemory() {
    check_intersection(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test]
async fn test_intersection_sled() {
    let temp_dir = TempDir::new().unwrap();
    check_intersection(Arc::new(SledStore::new(temp_dir.path()).unwrap())).await;
}

#[tokio::test]
async fn test_owner_with_two_matching_rows_appears_once() {
    let store: Arc<dyn AttributeStore> = Arc::new(InMemoryStore::new());
    let tenant = Uuid::new_v4();
    let thing = owner(tenant, "Thing");
    seed(
        &*store,
        &thing,
        &[
            ("primary", DataType::String, "blue"),
            ("secondary", DataType::String, "blue"),
        ],
    )
    .await;

    let page = engine(store)
        .search(
            &RowScope::tenant(tenant),
            &[ConstraintGroup::new().with_raw_value("blue")],
            &PageRequest::new(1, 10),
        )
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.page.total_elements, 1);
    assert_eq!(page.data[0].attributes.len(), 1);
}

#[tokio::test]
async fn test_same_id_under_different_types_is_distinct() {
    let store: Arc<dyn AttributeStore> = Arc::new(InMemoryStore::new());
    let tenant = Uuid::new_v4();
    let shared = Uuid::new_v4();
    for owner_type in ["ownerA", "ownerC", "ownerB"] {
        let typed = OwnerIdentity::new(tenant, owner_type, shared);
        seed(&*store, &typed, &[("tag", DataType::String, "x")]).await;
    }

    let engine = engine(store);
    let scope = RowScope::tenant(tenant);
    let request = PageRequest::new(1, 10).sorted_by(SortField::OwnerType, SortOrder::Ascending);
    let page = engine.search(&scope, &[group("tag")], &request).await.unwrap();

    let types: Vec<&str> = page.data.iter().map(|m| m.owner_type()).collect();
    assert_eq!(types, vec!["ownerA", "ownerB", "ownerC"]);
    assert!(page.data.iter().all(|m| m.owner.owner_id == shared));

    let only_b = engine
        .search(&RowScope::owner_type(tenant, "OWNERB"), &[group("tag")], &request)
        .await
        .unwrap();
    assert_eq!(only_b.data.len(), 1);
    assert_eq!(only_b.data[0].owner_type(), "ownerB");
}

#[tokio::test]
async fn test_sort_by_key_name_descending() {
    let store: Arc<dyn AttributeStore> = Arc::new(InMemoryStore::new());
    let tenant = Uuid::new_v4();
    let alpha = owner(tenant, "Thing");
    let beta = owner(tenant, "Thing");
    seed(&*store, &alpha, &[("alpha", DataType::String, "on")]).await;
    seed(&*store, &beta, &[("beta", DataType::String, "on")]).await;

    let request = PageRequest::new(1, 10).sorted_by(SortField::KeyName, SortOrder::Descending);
    let page = engine(store)
        .search(
            &RowScope::tenant(tenant),
            &[ConstraintGroup::new().with_raw_value("on")],
            &request,
        )
        .await
        .unwrap();

    let found: Vec<_> = page.data.iter().map(|m| m.owner.clone()).collect();
    assert_eq!(found, vec![beta, alpha]);
}

#[tokio::test]
async fn test_empty_inputs() {
    let store: Arc<dyn AttributeStore> = Arc::new(InMemoryStore::new());
    let tenant = Uuid::new_v4();
    seed_twelve(&*store, tenant).await;
    let engine = engine(store);
    let request = PageRequest::new(1, 5);

    let none = engine
        .search(&RowScope::tenant(tenant), &[], &request)
        .await
        .unwrap();
    assert!(none.data.is_empty());
    assert_eq!(none.page, PageInfo::default());

    let degenerate = engine
        .search(&RowScope::tenant(tenant), &[ConstraintGroup::new()], &request)
        .await
        .unwrap();
    assert_eq!(degenerate.page.total_elements, 0);

    let everyone = engine
        .find_owners_by_attribute_map(tenant, &Default::default(), &request)
        .await
        .unwrap();
    assert_eq!(everyone.data.len(), 5);
    assert_eq!(everyone.page.total_elements, 12);

    let other_tenant = engine
        .find_owners_by_attribute_map(Uuid::new_v4(), &Default::default(), &request)
        .await
        .unwrap();
    assert_eq!(other_tenant.page, PageInfo::default());
}

#[tokio::test]
async fn test_attribute_map_matches_null_values() {
    let store: Arc<dyn AttributeStore> = Arc::new(InMemoryStore::new());
    let tenant = Uuid::new_v4();
    let cleared = owner(tenant, "Thing");
    let set = owner(tenant, "Thing");
    store
        .upsert_row(metadata_store::models::AttributeRow::new(
            &cleared,
            "note",
            DataType::Null,
            None,
        ))
        .await
        .unwrap();
    seed(&*store, &set, &[("note", DataType::String, "hello")]).await;

    let page = engine(store)
        .find_owners_by_attribute_map(
            tenant,
            &common::map(json!({ "note": null })),
            &PageRequest::new(1, 10),
        )
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].owner, cleared);
    assert_eq!(page.data[0].attributes[0].value, serde_json::Value::Null);
}
