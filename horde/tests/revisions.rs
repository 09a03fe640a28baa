use horde::{
    Error, Model, Operation, Revision, RevisionPolicy, SaveOptions, Versioned,
    bson::{Bson, Document, doc},
    store::memory,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Model)]
#[model(versioned)]
struct Article(Document);

#[derive(Debug, Model)]
#[model(versioned)]
struct Draft(Document);

#[derive(Debug, Model)]
#[model(table = "draft_history")]
struct DraftHistory(Document);

#[derive(Debug, Model)]
#[model(versioned)]
struct Page(Document);

#[derive(Debug, Model)]
#[model(table = "page_history")]
struct PageHistory(Document);

#[derive(Debug, Model)]
struct Plain(Document);

#[derive(Debug, Model)]
#[model(table = "plain_history")]
struct PlainHistory(Document);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn history_of_saves_and_deletes() {
    init_tracing();

    let database = memory::client().database("revisions");
    Article::bind_database(database.clone());
    Revision::bind_database(database.clone());

    let mut article = Article::from(doc! { "title": "draft" });
    assert_eq!(article.version_count().await.unwrap(), 0);
    assert!(!article.is_versioned().await.unwrap());

    article.save().await.unwrap();
    article.set("title", "final");
    article.save_with(SaveOptions {
        author: Some("kit".to_owned()),
        ..SaveOptions::default()
    })
    .await
    .unwrap();
    article.set("title", "published");
    article.save().await.unwrap();

    assert_eq!(article.version_count().await.unwrap(), 3);
    assert!(article.is_versioned().await.unwrap());

    let revisions = article.get_revisions().unwrap();

    let latest = revisions.get(-1).await.unwrap();
    assert_eq!(latest.operation(), Some(Operation::Update));
    assert_eq!(
        latest.snapshot().and_then(|snapshot| snapshot.get_str("title").ok()),
        Some("published")
    );

    let second = revisions.get(-2).await.unwrap();
    assert_eq!(second.author(), Some("kit"));
    assert_eq!(second, revisions.get(1).await.unwrap());

    let first = revisions.get(0).await.unwrap();
    assert_eq!(first.operation(), Some(Operation::Create));
    assert_eq!(first.document_type(), Some("Article"));
    assert_eq!(first.document_id(), article.id());
    assert!(first.creation_date().is_some());

    let error = revisions.get(-4).await.unwrap_err();
    assert!(matches!(error, Error::IndexOutOfRange(-4)));

    let error = revisions.get(3).await.unwrap_err();
    assert!(matches!(error, Error::IndexOutOfRange(3)));

    article.delete().await.unwrap();
    assert_eq!(article.version_count().await.unwrap(), 4);

    let deleted = article.revisions().unwrap().get(-1).await.unwrap();
    assert_eq!(deleted.operation(), Some(Operation::Delete));
    assert_eq!(deleted.snapshot(), None);

    let names = Revision::get_collection()
        .unwrap()
        .database()
        .list_collection_names()
        .await
        .unwrap();
    assert_eq!(names, vec!["article".to_owned(), "revision".to_owned()]);
}

#[tokio::test]
async fn revert_steps_back_and_is_recorded() {
    init_tracing();

    let database = memory::client().database("revisions");
    Draft::bind_database(database.clone());
    Draft::set_revision_policy(RevisionPolicy::stored_in::<DraftHistory>());
    DraftHistory::bind_database(database);

    let mut unsaved = Draft::from(doc! { "body": "nothing" });
    unsaved.revert().await.unwrap();
    assert_eq!(unsaved.document(), &doc! { "body": "nothing" });

    let mut draft = Draft::from(doc! { "_id": 7, "body": "baz" });
    draft.save().await.unwrap();

    draft.revert().await.unwrap();
    assert_eq!(draft.document(), &doc! { "_id": 7 });

    draft.revert().await.unwrap();
    assert_eq!(draft.get("body"), Some(&Bson::from("baz")));

    draft.set("body", "qux");
    draft.save().await.unwrap();
    draft.revert().await.unwrap();
    assert_eq!(draft.get("body"), Some(&Bson::from("baz")));

    let stored = Draft::find_one(7).await.unwrap().unwrap();
    assert_eq!(stored.get("body"), Some(&Bson::from("baz")));

    assert_eq!(draft.version_count().await.unwrap(), 5);
    assert_eq!(DraftHistory::count_documents(()).await.unwrap(), 5);
}

#[tokio::test]
async fn explicit_operation_is_recorded_after_the_first_revision() {
    let database = memory::client().database("revisions");
    Page::bind_database(database.clone());
    Page::set_revision_policy(RevisionPolicy::stored_in::<PageHistory>());
    PageHistory::bind_database(database);

    let options = SaveOptions {
        operation: Some(Operation::Delete),
        ..SaveOptions::default()
    };

    let mut page = Page::from(doc! { "_id": "home" });
    page.save_with(options.clone()).await.unwrap();
    page.save_with(options).await.unwrap();

    let revisions = page.get_revisions().unwrap();
    let operations = [
        revisions.get(0).await.unwrap().operation(),
        revisions.get(1).await.unwrap().operation(),
    ];
    assert_eq!(operations, [Some(Operation::Create), Some(Operation::Delete)]);
}

#[tokio::test]
async fn unversioned_types_record_nothing() {
    let database = memory::client().database("revisions");
    Plain::bind_database(database.clone());
    Plain::set_revision_policy(RevisionPolicy {
        enabled: false,
        ..RevisionPolicy::stored_in::<PlainHistory>()
    });
    PlainHistory::bind_database(database);

    let mut plain = Plain::from(doc! { "value": 1 });
    plain.save().await.unwrap();
    assert_eq!(plain.version_count().await.unwrap(), 0);

    Plain::set_revision_policy(RevisionPolicy::stored_in::<PlainHistory>());
    plain.save().await.unwrap();
    assert_eq!(plain.version_count().await.unwrap(), 1);

    Plain::set_revision_policy(RevisionPolicy {
        enabled: false,
        ..RevisionPolicy::stored_in::<PlainHistory>()
    });
    plain.delete().await.unwrap();
    assert_eq!(PlainHistory::count_documents(()).await.unwrap(), 1);
}
