use horde::{
    Model, Revision,
    blocking::{BlockingModel, BlockingVersioned},
    bson::{Bson, Document, doc},
    store::memory,
};

#[derive(Debug, Model)]
#[model(views(short(title)))]
struct Book(Document);

#[derive(Debug, Model)]
#[model(versioned)]
struct Chapter(Document);

#[test]
fn blocking_crud_and_cursors() {
    Book::bind_database(memory::client().database("blocking"));

    let ids = Book::blocking_insert_many(vec![
        doc! { "_id": 1, "title": "a", "pages": 100 },
        doc! { "_id": 2, "title": "b", "pages": 200 },
        doc! { "_id": 3, "title": "c", "pages": 300 },
    ])
    .unwrap();
    assert_eq!(ids.len(), 3);

    let cursor = Book::blocking_find(doc! { "pages": { "$gt": 100 } })
        .unwrap()
        .sort(doc! { "pages": -1 })
        .unwrap();
    assert_eq!(cursor.count_documents().unwrap(), 2);
    assert_eq!(cursor.first().unwrap().unwrap().id(), Some(&Bson::Int32(3)));

    let titles = cursor
        .map(|book| book.unwrap().get("title").cloned())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec![Some(Bson::from("c")), Some(Bson::from("b"))]);

    let short = Book::blocking_find_view(1, "short")
        .unwrap()
        .to_list(None)
        .unwrap();
    assert_eq!(short.into_vec(), vec![doc! { "title": "a" }]);

    let mut book = Book::blocking_find_one(2).unwrap().unwrap();
    book.set("pages", 250);
    book.blocking_save().unwrap();
    assert_eq!(
        Book::blocking_count_documents(doc! { "pages": 250 }).unwrap(),
        1
    );

    book.blocking_delete().unwrap();
    assert_eq!(Book::blocking_count_documents(()).unwrap(), 2);
    assert_eq!(
        Book::blocking_find(()).unwrap().delete().unwrap(),
        2
    );
}

#[test]
fn blocking_revisions() {
    let database = memory::client().database("blocking");
    Chapter::bind_database(database.clone());
    Revision::bind_database(database);

    let mut chapter = Chapter::from(doc! { "heading": "one" });
    chapter.blocking_save().unwrap();
    chapter.set("heading", "two");
    chapter.blocking_save().unwrap();

    assert!(chapter.blocking_is_versioned().unwrap());
    assert_eq!(chapter.blocking_version_count().unwrap(), 2);

    let revisions = chapter.blocking_revisions().unwrap();
    assert_eq!(revisions.count_documents().unwrap(), 2);
    let latest = revisions.get(-1).unwrap();
    assert_eq!(
        latest.snapshot().and_then(|snapshot| snapshot.get_str("heading").ok()),
        Some("two")
    );
    assert_eq!(revisions.count(), 2);

    chapter.blocking_revert().unwrap();
    assert_eq!(chapter.get("heading"), Some(&Bson::from("one")));
    assert_eq!(chapter.blocking_version_count().unwrap(), 3);
}
