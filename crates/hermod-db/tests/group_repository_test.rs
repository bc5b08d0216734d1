//! Integration tests for the instance-group repository using in-memory
//! SurrealDB.

use hermod_core::error::HermodError;
use hermod_core::models::instance_group::{CreateInstanceGroup, UpdateInstanceGroup};
use hermod_core::repository::GroupRepository;
use hermod_db::SurrealGroupRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    hermod_db::run_migrations(&db).await.unwrap();
    db
}

fn create_input(name: &str, alias: &str, instances: &[&str]) -> CreateInstanceGroup {
    CreateInstanceGroup {
        name: name.into(),
        alias: alias.into(),
        description: None,
        enabled: true,
        instances: instances.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn create_and_get_group() {
    let repo = SurrealGroupRepository::new(setup().await);

    let group = repo
        .create(create_input("Sales BR", "sales-br", &["wa-01", "wa-02"]))
        .await
        .unwrap();

    assert_eq!(group.name, "Sales BR");
    assert_eq!(group.alias, "sales-br");
    assert!(group.enabled);
    assert_eq!(group.instances, vec!["wa-01", "wa-02"]);

    let by_id = repo.get_by_id(group.id).await.unwrap();
    assert_eq!(by_id.id, group.id);

    let by_name = repo.get_by_name("Sales BR").await.unwrap();
    assert_eq!(by_name.id, group.id);

    let by_alias = repo.get_by_alias("sales-br").await.unwrap();
    assert_eq!(by_alias.id, group.id);
}

#[tokio::test]
async fn duplicate_name_and_alias_rejected() {
    let repo = SurrealGroupRepository::new(setup().await);

    repo.create(create_input("Sales", "sales", &["wa-01"]))
        .await
        .unwrap();

    let err = repo
        .create(create_input("Sales", "sales-two", &["wa-01"]))
        .await
        .unwrap_err();
    assert!(matches!(err, HermodError::Validation { .. }), "{err:?}");

    let err = repo
        .create(create_input("Sales Two", "sales", &["wa-01"]))
        .await
        .unwrap_err();
    assert!(matches!(err, HermodError::Validation { .. }), "{err:?}");
}

#[tokio::test]
async fn update_rejects_collision_with_other_record_only() {
    let repo = SurrealGroupRepository::new(setup().await);

    let first = repo
        .create(create_input("First", "first", &["wa-01"]))
        .await
        .unwrap();
    repo.create(create_input("Second", "second", &["wa-02"]))
        .await
        .unwrap();

    // Renaming to a taken name fails.
    let err = repo
        .update(
            first.id,
            UpdateInstanceGroup {
                name: Some("Second".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HermodError::Validation { .. }));

    // Re-asserting our own name is not a collision.
    let updated = repo
        .update(
            first.id,
            UpdateInstanceGroup {
                name: Some("First".into()),
                description: Some("primary pool".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("primary pool"));
}

#[tokio::test]
async fn update_toggles_enabled() {
    let repo = SurrealGroupRepository::new(setup().await);

    let group = repo
        .create(create_input("Pool", "pool", &["wa-01"]))
        .await
        .unwrap();

    let updated = repo
        .update(
            group.id,
            UpdateInstanceGroup {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.enabled);
}

#[tokio::test]
async fn add_instance_appends_and_rejects_duplicates() {
    let repo = SurrealGroupRepository::new(setup().await);

    let group = repo
        .create(create_input("Pool", "pool", &["wa-01"]))
        .await
        .unwrap();

    let updated = repo.add_instance(group.id, "wa-02").await.unwrap();
    assert_eq!(updated.instances, vec!["wa-01", "wa-02"]);

    let err = repo.add_instance(group.id, "wa-02").await.unwrap_err();
    assert!(matches!(err, HermodError::Validation { .. }));
}

#[tokio::test]
async fn remove_instance_guards_membership() {
    let repo = SurrealGroupRepository::new(setup().await);

    let group = repo
        .create(create_input("Pool", "pool", &["wa-01", "wa-02"]))
        .await
        .unwrap();

    // Absent member.
    let err = repo.remove_instance(group.id, "wa-99").await.unwrap_err();
    assert!(matches!(err, HermodError::Validation { .. }));

    let updated = repo.remove_instance(group.id, "wa-01").await.unwrap();
    assert_eq!(updated.instances, vec!["wa-02"]);

    // Removing the last member is rejected.
    let err = repo.remove_instance(group.id, "wa-02").await.unwrap_err();
    assert!(matches!(err, HermodError::Validation { .. }));
}

#[tokio::test]
async fn delete_and_missing_lookups() {
    let repo = SurrealGroupRepository::new(setup().await);

    let group = repo
        .create(create_input("Pool", "pool", &["wa-01"]))
        .await
        .unwrap();

    repo.delete(group.id).await.unwrap();

    let err = repo.get_by_id(group.id).await.unwrap_err();
    assert!(matches!(err, HermodError::NotFound { .. }));

    let err = repo.delete(group.id).await.unwrap_err();
    assert!(matches!(err, HermodError::NotFound { .. }));

    let err = repo.get_by_alias("pool").await.unwrap_err();
    assert!(matches!(err, HermodError::NotFound { .. }));
}

#[tokio::test]
async fn list_returns_creation_order() {
    let repo = SurrealGroupRepository::new(setup().await);

    repo.create(create_input("One", "one", &["wa-01"]))
        .await
        .unwrap();
    repo.create(create_input("Two", "two", &["wa-02"]))
        .await
        .unwrap();

    let groups = repo.list().await.unwrap();
    assert_eq!(groups.len(), 2);
    let aliases: Vec<_> = groups.iter().map(|g| g.alias.as_str()).collect();
    assert_eq!(aliases, vec!["one", "two"]);
}
