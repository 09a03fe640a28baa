use horde::{
    IndexSpec, Model, ModelConfig,
    bson::{Document, doc},
    store::memory,
};

#[derive(Debug, Model)]
#[model(setup = "declare_audit")]
struct Audit(Document);

#[derive(Debug, Model)]
struct Actor(Document);

fn declare_audit(config: &mut ModelConfig) {
    Audit::add_index(IndexSpec::new(doc! { "at": -1 }));
    Audit::set_database_name("audits");

    config.table_name(format!("{}_{}_log", Actor::table_name(), Audit::table_name()));
}

#[tokio::test]
async fn setup_may_call_back_into_the_model() {
    Audit::bind_client(memory::client());

    assert_eq!(Audit::table_name(), "actor_audit_log");

    let collection = Audit::get_collection().unwrap();
    assert_eq!(collection.namespace(), "audits.actor_audit_log");

    Audit::create_indexes().await.unwrap();
    assert_eq!(
        collection.list_index_names().await.unwrap(),
        vec!["_id_", "at_-1"]
    );
}
