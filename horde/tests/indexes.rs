use horde::{
    IndexSpec, Model, ModelConfig, Revision,
    bson::{Document, doc},
    store::memory,
};

#[derive(Debug, Model)]
#[model(setup = "declare_ledger")]
struct Ledger(Document);

fn declare_ledger(config: &mut ModelConfig) {
    config.index(IndexSpec::new(doc! { "account": 1 }).unique(true));
}

#[derive(Debug, Model)]
struct Journal(Document);

#[derive(Debug, Model)]
struct Untouched(Document);

#[tokio::test]
async fn create_index_applies_immediately() {
    Journal::bind_database(memory::client().database("indexes"));

    let name = Journal::create_index(IndexSpec::new(doc! { "entry": 1 }).named("by_entry"))
        .await
        .unwrap();
    assert_eq!(name, "by_entry");

    let names = Journal::get_collection()
        .unwrap()
        .list_index_names()
        .await
        .unwrap();
    assert_eq!(names, vec!["_id_".to_owned(), "by_entry".to_owned()]);

    Journal::create_indexes().await.unwrap();
}

#[tokio::test]
async fn registered_indexes_are_deployed_together() {
    let database = memory::client().database("indexes");
    Ledger::bind_database(database.clone());
    Revision::bind_database(database.clone());

    Ledger::add_index(IndexSpec::new(doc! { "date": -1 }));

    assert!(Ledger::get_collection().unwrap().list_index_names().await.unwrap() == ["_id_"]);

    horde::create_indexes().await.unwrap();
    horde::create_indexes().await.unwrap();

    let names = Ledger::get_collection()
        .unwrap()
        .list_index_names()
        .await
        .unwrap();
    assert_eq!(names, vec!["_id_", "account_1", "date_-1"]);

    let names = Revision::get_collection()
        .unwrap()
        .list_index_names()
        .await
        .unwrap();
    assert_eq!(names, vec!["_id_", "document_id_-1_document_type_-1"]);

    let mut entry = Ledger::from(doc! { "account": "a", "date": 1 });
    entry.save().await.unwrap();

    let error = Ledger::insert_one(doc! { "account": "a", "date": 2 })
        .await
        .unwrap_err();
    assert!(error.is_duplicate_key());

    Untouched::create_indexes().await.unwrap();
    assert!(Untouched::get_collection().is_err());
}
