/// ## Getting started
///
/// The [`Model`](crate::Model) trait maps a Rust type to a `MongoDB` collection. A model
/// is a thin wrapper around a [`Document`](mongodb::bson::Document): fields are read and
/// written with [`get`](crate::Model::get), [`set`](crate::Model::set) and
/// [`unset`](crate::Model::unset), or through serde with
/// [`deserialize`](crate::Model::deserialize).
///
/// A type that derives [`Model`](crate::Model) must be a tuple struct with a single
/// [`Document`](mongodb::bson::Document) field.
///
/// ### Example
///
/// ```ignore
/// use horde::{Model, bson::Document};
///
/// #[derive(Model)]
/// struct User(Document);
/// ```
///
/// The collection name is the lowercase form of the struct name (`User` → `user`). It is
/// used verbatim, nothing is pluralized. Override it with `#[model(table = "users")]` or
/// at runtime with [`set_table_name`](crate::Model::set_table_name).
///
/// ### Attributes
///
/// - `table = "name"`: the collection name.
/// - `camel_case`: store `snake_case` fields as `camelCase`, see [`FieldCodec`](crate::FieldCodec).
/// - `versioned`: record a revision on every save and delete.
/// - `views(name(field, ...))`: named projections, see [views](self::views).
/// - `setup = "path"`: a `fn(&mut ModelConfig)` run before the type is first used, for
///   indexes and anything the other attributes don't cover.
///
/// ### Identity
///
/// [`id`](crate::Model::id) returns a literal `id` field when the document has one and
/// `_id` otherwise. [`set_id`](crate::Model::set_id) writes to whichever of the two is in
/// use, `_id` by default.
///
/// [`save`](crate::Model::save) upserts by identity, or inserts when there is none and
/// writes the generated `_id` back. [`SaveOptions`](crate::SaveOptions) can force an
/// insert, which fails with a duplicate key error when the identity is taken.
mod getting_started {}

/// ## Resolution
///
/// Every operation first resolves the model type to a collection:
///
/// 1. a collection bound with [`bind_collection`](crate::Model::bind_collection),
/// 2. otherwise the type's database, looked up by table name.
///
/// The database is the one bound with [`bind_database`](crate::Model::bind_database), the
/// parent of a bound collection, or the database named by
/// [`set_database_name`](crate::Model::set_database_name) (or by the connection string)
/// on the type's client. The client is the one bound with
/// [`bind_client`](crate::Model::bind_client), the client of a bound database or
/// collection, or the default set by [`connect`](crate::connect).
///
/// A link that cannot be resolved fails with
/// [`Error::Configuration`](crate::Error::Configuration) naming it. Results are cached
/// per type and dropped on rebinding, [`connect`](crate::connect) and
/// [`disconnect`](crate::disconnect).
///
/// ```ignore
/// horde::connect("mongodb://localhost/app").await?;
///
/// // Audit logs live elsewhere
/// AuditLog::bind_database(horde::open_client("mongodb://archive/logs").await?.database("logs"));
/// ```
mod resolution {}

/// ## Views
///
/// A [`View`](crate::View) selects fields of a document. Views are registered per type,
/// either in the derive attribute or with [`add_view`](crate::Model::add_view):
///
/// ```ignore
/// #[derive(Model)]
/// #[model(views(public(name, email)))]
/// struct User(Document);
///
/// User::add_view("safe", View::defaults().exclude("password"));
///
/// let public = User::find_view((), "public")?.to_list(None).await?;
/// let safe = user.view("safe")?;
/// ```
///
/// The `defaults` view holds every field unless another one is registered under that
/// name. [`Results::distinct`](crate::Results::distinct) reads entities through it.
mod views {}

/// ## Revisions
///
/// A versioned type appends a [`Revision`](crate::Revision) to the `revision` collection
/// on every save and delete. The first one of a document is a `create`, the following
/// ones are `update`s, and a delete records a `delete` without snapshot.
///
/// [`Versioned`](crate::Versioned) reads the history back:
///
/// ```ignore
/// let mut post = Post::from(doc! { "title": "draft" });
/// post.save().await?;
///
/// post.set("title", "final");
/// post.save().await?;
///
/// assert_eq!(post.version_count().await?, 2);
///
/// let latest = post.get_revisions()?.get(-1).await?;
///
/// // back to "draft", recorded as a third revision
/// post.revert().await?;
/// ```
///
/// Revisions can go to another collection with
/// [`RevisionPolicy::stored_in`](crate::RevisionPolicy::stored_in). The host write and
/// the revision append are independent writes.
mod revisions {}

/// ## Blocking
///
/// [`blocking`](crate::blocking) mirrors the async API with `blocking_` methods driven on
/// a process-wide runtime. Blocking cursors are iterators.
///
/// ```ignore
/// use horde::blocking::BlockingModel;
///
/// for user in User::blocking_find(doc! { "active": true })? {
///     println!("{:?}", user?.id());
/// }
/// ```
mod blocking {}

/// ## Testing
///
/// `memory://` connection strings select the in-process backend of
/// [`store::memory`](crate::store::memory), which needs no server:
///
/// ```ignore
/// let client = horde::store::memory::client();
/// User::bind_database(client.database("test"));
/// ```
mod testing {}

/// This library is named "Horde" because a horde is what you get from Mongolia.
mod naming {}
