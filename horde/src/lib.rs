//! Horde maps `MongoDB` documents onto Rust types.
//!
//! ## Example
//!
//! ```no_run
//! use horde::{Model, Versioned, bson::doc};
//!
//! // Declare a document type
//! #[derive(Model)]
//! #[model(versioned, views(public(name)))]
//! struct User(horde::bson::Document);
//!
//! # async fn example() -> horde::Result<()> {
//! // Bind every model type to one database
//! horde::connect("mongodb://localhost/app").await?;
//!
//! // Insert a document, its generated identity is written back
//! let mut user = User::from(doc! { "name": "kit", "password": "hunter2" });
//! user.save().await?;
//!
//! // Find documents, bound to the type
//! let mut users = User::find(doc! { "name": "kit" })?.limit(10)?;
//! while let Some(user) = users.next().await? {
//!     println!("{:?}", user.id());
//! }
//!
//! // Or projected through a view
//! let names = User::find_view((), "public")?.to_list(None).await?;
//!
//! // Every save of a versioned type is recorded
//! user.set("name", "nikita");
//! user.save().await?;
//! user.revert().await?;
//! assert_eq!(user.version_count().await?, 3);
//! # Ok(())
//! # }
//! ```
//!
//! See [`guides`] module to learn more!

#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate self as horde;

pub use horde_macros::Model;
pub use mongodb::{self, bson};

pub mod blocking;
pub mod codec;
pub mod config;
mod connection;
mod cursor;
mod error;
mod filter;
pub mod guides;
pub mod meta;
mod model;
mod registry;
pub mod resolver;
mod results;
pub mod revision;
pub mod store;
mod view;

pub use codec::FieldCodec;
pub use connection::{
    ConnectOptions, DEFAULT_DATABASE_NAME, connect, connect_with, disconnect, open_client,
};
pub use cursor::Cursor;
pub use error::{Error, Result, Undefined};
pub use filter::{Filter, FilterById, by_id};
pub use meta::create_indexes;
pub use model::{Model, SaveOptions};
pub use registry::ModelConfig;
pub use results::{Projectable, Results};
pub use revision::{Operation, Revision, RevisionCursor, RevisionPolicy, Versioned};
pub use store::{Client, Collection, Database, IndexSpec, ReturnDocument, UpdateOutcome};
pub use view::{DEFAULT_VIEW, View};

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "meta")]
    pub use inventory;
}
