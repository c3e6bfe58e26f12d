use std::sync::Arc;

use dormouse::prelude::*;
use dormouse::{DormouseConfig, SchemaPolicy};
use dormouse_test::{FixtureTree, TestDatabase};
use serial_test::serial;

mod app {
    pub mod models {
        use dormouse::Entity;

        #[derive(Debug, Clone, PartialEq, Entity)]
        #[entity(table = "notes")]
        pub struct Note {
            pub id: i64,
            pub body: String,
        }
    }

    pub mod entity {
        use dormouse::Entity;

        /// Same table as `Note`, with one more column.
        #[derive(Debug, Clone, PartialEq, Entity)]
        #[entity(table = "notes")]
        pub struct TaggedNote {
            pub id: i64,
            pub body: String,
            pub tag: Option<String>,
        }
    }
}

use app::entity::TaggedNote;
use app::models::Note;

fn context(registry: TypeRegistry) -> (FixtureTree, Arc<dyn LoadingContext>) {
    let (tree, class_path) = FixtureTree::for_registry(registry).unwrap();
    (tree, Arc::new(class_path))
}

#[tokio::test]
async fn invalid_profiles_fail_before_discovery() {
    let err = build_session_factory(ConnectionProfile::new().address("x.db"))
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let err = build_session_factory(ConnectionProfile::new().driver(DriverKind::Sqlite))
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let db = TestDatabase::new().unwrap();
    let err = build_session_factory(
        ConnectionProfile::new()
            .driver(DriverKind::Sqlite)
            .address(db.path().to_string_lossy()),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        DataError::Discovery(dormouse::DiscoveryError::MissingContext)
    ));
    // Nothing connected, so nothing was created.
    assert!(!db.path().exists());
}

#[tokio::test]
async fn empty_discovery_is_fatal() {
    let (_tree, ctx) = context(TypeRegistry::new());
    let db = TestDatabase::new().unwrap();
    let err = build_session_factory(db.profile(ctx)).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(!db.path().exists());
}

#[tokio::test]
async fn extra_entities_join_discovered_ones() {
    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let db = TestDatabase::new().unwrap();
    let factory = build_session_factory(db.profile(ctx).root_package("bootstrap.app.models"))
        .await
        .unwrap();
    assert!(factory.mapping_of::<Note>().is_ok());
    assert!(matches!(
        factory.mapping_of::<TaggedNote>(),
        Err(DataError::Unmapped(_))
    ));
    factory.close().await;

    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let factory = build_session_factory(
        db.profile(ctx)
            .root_package("bootstrap.app.models")
            .extra_entity::<TaggedNote>(),
    )
    .await
    .unwrap();
    assert!(factory.mapping_of::<TaggedNote>().is_ok());
}

#[tokio::test]
async fn schema_update_adds_missing_columns() {
    let db = TestDatabase::new().unwrap();

    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let first = build_session_factory(db.profile(ctx)).await.unwrap();
    let note = first
        .upsert(Note {
            id: 0,
            body: "before".into(),
        })
        .await
        .unwrap();
    first.close().await;

    let (_tree, ctx) = context(TypeRegistry::new().with::<TaggedNote>());
    let second = build_session_factory(db.profile(ctx)).await.unwrap();
    // Every pooled connection sees the added column, from the first read on.
    let (one, all) = tokio::join!(
        second.find_by_key::<TaggedNote>(note.id),
        second.find_all::<TaggedNote>()
    );
    assert!(one.unwrap().is_some());
    assert_eq!(all.unwrap().len(), 1);
    let loaded: TaggedNote = second.find_by_key(note.id).await.unwrap().unwrap();
    assert_eq!(loaded.body, "before");
    assert_eq!(loaded.tag, None);

    second
        .upsert(TaggedNote {
            tag: Some("todo".into()),
            ..loaded
        })
        .await
        .unwrap();
    let tagged: Vec<TaggedNote> = second.find_list_by_field("tag", "todo").await.unwrap();
    assert_eq!(tagged.len(), 1);
}

#[tokio::test]
async fn in_memory_databases_keep_their_schema() {
    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let factory = build_session_factory(
        ConnectionProfile::new()
            .driver(DriverKind::Sqlite)
            .address(":memory:")
            .loading_context(ctx),
    )
    .await
    .unwrap();
    let saved = factory
        .upsert(Note {
            id: 0,
            body: "kept".into(),
        })
        .await
        .unwrap();
    let found: Option<Note> = factory.find_by_key(saved.id).await.unwrap();
    assert_eq!(found, Some(saved));
}

#[tokio::test]
async fn schema_policy_none_leaves_tables_alone() {
    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let db = TestDatabase::new().unwrap();
    let factory = build_session_factory(db.profile(ctx).schema_policy(SchemaPolicy::None))
        .await
        .unwrap();
    let err = factory.find_all::<Note>().await.unwrap_err();
    assert!(matches!(err, DataError::Database(_)));
}

#[tokio::test]
async fn base_package_narrows_the_scan() {
    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>().with::<TaggedNote>());
    let db = TestDatabase::new().unwrap();
    let factory = build_session_factory(db.profile(ctx).base_package("bootstrap.app"))
        .await
        .unwrap();
    // `entity` is tried before `models`.
    assert!(factory.mapping_of::<TaggedNote>().is_ok());
    assert!(factory.mapping_of::<Note>().is_err());
}

#[tokio::test]
async fn profile_from_configuration() {
    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let db = TestDatabase::new().unwrap();
    let yaml = format!(
        "dormouse:\n  datasource:\n    driver: sqlite\n    address: \"{}\"\n    root-package: bootstrap.app.models\n    max-connections: 2\n",
        db.path().display()
    );
    let config = DormouseConfig::from_yaml_str(&yaml, "test").unwrap();
    let profile = ConnectionProfile::from_config(&config)
        .unwrap()
        .loading_context(ctx);
    let factory = build_session_factory(profile).await.unwrap();
    assert_eq!(factory.driver(), DriverKind::Sqlite);
    assert_eq!(factory.settings().get("pool.max_connections"), Some("2"));
    assert_eq!(factory.metadata().len(), 1);
}

#[tokio::test]
#[serial]
async fn singleton_is_replaced_by_the_last_bootstrap() {
    orm::uninstall();
    let err = orm::find_all::<Note>().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(!orm::delete(&Note { id: 1, body: String::new() }).await);

    let (_tree_a, ctx_a) = context(TypeRegistry::new().with::<Note>());
    let db_a = TestDatabase::new().unwrap();
    let first = bootstrap(db_a.profile(ctx_a)).await.unwrap();
    assert!(orm::is_installed());
    assert!(orm::current().unwrap().same_as(&first));

    let saved = orm::upsert(Note {
        id: 0,
        body: "in a".into(),
    })
    .await
    .unwrap();
    let found: Option<Note> = orm::find_by_key(saved.id).await.unwrap();
    assert_eq!(found, Some(saved.clone()));

    let (_tree_b, ctx_b) = context(TypeRegistry::new().with::<Note>());
    let db_b = TestDatabase::new().unwrap();
    let second = bootstrap(db_b.profile(ctx_b)).await.unwrap();
    assert!(orm::current().unwrap().same_as(&second));
    assert!(!orm::current().unwrap().same_as(&first));

    // The new factory has its own database.
    let all: Vec<Note> = orm::find_all().await.unwrap();
    assert!(all.is_empty());
    // The replaced handle keeps working for whoever still holds it.
    assert_eq!(first.find_all::<Note>().await.unwrap(), vec![saved]);

    assert!(orm::uninstall().is_some());
    assert!(!orm::is_installed());
}

#[tokio::test]
#[serial]
async fn free_functions_cover_every_operation() {
    let (_tree, ctx) = context(TypeRegistry::new().with::<Note>());
    let db = TestDatabase::new().unwrap();
    bootstrap(db.profile(ctx)).await.unwrap();

    let a = orm::upsert(Note { id: 0, body: "a".into() }).await.unwrap();
    let b = orm::upsert(Note { id: 0, body: "b".into() }).await.unwrap();

    let one: Option<Note> = orm::find_one_by_field("body", "b").await.unwrap();
    assert_eq!(one.as_ref().map(|n| n.id), Some(b.id));
    let one: Option<Note> = orm::find_one_by_predicates(&predicates! { "body" => "a" })
        .await
        .unwrap();
    assert_eq!(one.map(|n| n.id), Some(a.id));
    let list: Vec<Note> = orm::find_list_by_field("body", "a").await.unwrap();
    assert_eq!(list.len(), 1);
    let list: Vec<Note> = orm::find_list_by_predicates(&PredicateMap::new()).await.unwrap();
    assert_eq!(list.len(), 2);

    let native: Vec<Note> = orm::find_list_by_sql("SELECT * FROM notes ORDER BY id DESC", vec![])
        .await
        .unwrap();
    assert_eq!(native[0].id, b.id);
    let native: Option<Note> = orm::find_one_by_sql("SELECT * FROM notes WHERE id = ?", vec![a.id.into()])
        .await
        .unwrap();
    assert!(native.is_some());

    assert!(orm::delete(&a).await);
    assert_eq!(orm::execute_sql("DELETE FROM notes", vec![]).await.unwrap(), 1);
    orm::uninstall();
}
