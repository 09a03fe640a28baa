use horde::{
    Cursor, FieldCodec, Model,
    bson::{Bson, Document, doc},
    store::memory,
};

#[derive(Debug, Model)]
#[model(camel_case, table = "accounts")]
struct Account(Document);

#[tokio::test]
async fn camel_case_fields_are_stored_camelized() {
    assert_eq!(Account::CODEC, FieldCodec::CamelCase);

    Account::bind_database(memory::client().database("codec"));

    let mut account = Account::from(doc! { "first_name": "kit", "last_login_at": 1 });
    account.save().await.unwrap();

    let collection = Account::get_collection().unwrap();
    assert_eq!(collection.name(), "accounts");

    let mut raw = Cursor::raw(collection.find(doc! {}));
    let stored = raw.next().await.unwrap().unwrap();
    assert_eq!(stored.get("firstName"), Some(&Bson::from("kit")));
    assert_eq!(stored.get("lastLoginAt"), Some(&Bson::Int32(1)));
    assert!(stored.contains_key("_id"));

    let found = Account::find_one(doc! { "firstName": "kit" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.get("first_name"), Some(&Bson::from("kit")));
    assert_eq!(found.id(), account.id());
}
