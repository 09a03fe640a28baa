//! Per-type configuration and the process-wide defaults.
//!
//! Every model type gets one [`ModelConfig`], created from its [`Model`] constants and
//! [`Model::declare`] the first time anything asks for it. Resolved handles are cached
//! next to the bindings they were derived from and dropped whenever those bindings
//! change.
//!
//! Map entries are never held across a call into another type's entry, into user code or
//! across an await point. `declare` therefore runs on a scratch configuration that is
//! merged into the map afterwards, so it may call back into any `Model` function.

use crate::{
    Error, Model, Result,
    revision::RevisionPolicy,
    store::{Client, Collection, Database, IndexSpec},
    view::{DEFAULT_VIEW, View},
};
use dashmap::{DashMap, mapref::entry::Entry};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::{
    any::TypeId,
    collections::HashMap,
    sync::LazyLock,
    thread::{self, ThreadId},
};

static CONFIGS: LazyLock<DashMap<TypeId, ModelConfig>> = LazyLock::new(DashMap::new);

static DEFAULTS: RwLock<Defaults> = RwLock::new(Defaults {
    client: None,
    database_name: None,
});

#[derive(Clone, Debug, Default)]
pub(crate) struct Defaults {
    pub client: Option<Client>,
    pub database_name: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Resolved {
    pub client: Option<Client>,
    pub database: Option<Database>,
    pub collection: Option<Collection>,
}

#[derive(Clone, Debug)]
pub(crate) struct RegisteredIndex {
    pub spec: IndexSpec,
    pub created: bool,
}

/// The configuration of one model type.
///
/// Handed to [`Model::declare`] once, before the type is first used, and afterwards only
/// changed through the `Model::bind_*` / `Model::set_*` functions.
pub struct ModelConfig {
    name: &'static str,
    pub(crate) table_name: Option<String>,
    pub(crate) client: Option<Client>,
    pub(crate) database: Option<Database>,
    pub(crate) database_name: Option<String>,
    pub(crate) collection: Option<Collection>,
    pub(crate) views: HashMap<String, View>,
    pub(crate) indexes: Vec<RegisteredIndex>,
    pub(crate) revisions: RevisionPolicy,
    pub(crate) create_indexes: fn() -> BoxFuture<'static, Result<()>>,
    pub(crate) resolved: Resolved,
    revisions_declared: bool,
    declaring: Option<ThreadId>,
}

impl ModelConfig {
    /// The configuration described by the constants of `M` alone.
    fn undeclared<M: Model>() -> Self {
        Self {
            name: M::NAME,
            table_name: None,
            client: None,
            database: None,
            database_name: None,
            collection: None,
            views: M::VIEWS
                .iter()
                .map(|(name, fields)| ((*name).to_owned(), View::include(fields.iter().copied())))
                .collect(),
            indexes: vec![],
            revisions: if M::VERSIONED {
                RevisionPolicy::enabled()
            } else {
                RevisionPolicy::disabled()
            },
            create_indexes: M::create_indexes,
            resolved: Resolved::default(),
            revisions_declared: false,
            declaring: None,
        }
    }

    /// Folds what `declare` set into this configuration. Declared values win over ones
    /// set by calls made from inside `declare`.
    fn absorb(&mut self, declared: Self) {
        self.table_name = declared.table_name.or(self.table_name.take());
        self.client = declared.client.or(self.client.take());
        self.database = declared.database.or(self.database.take());
        self.database_name = declared.database_name.or(self.database_name.take());
        self.collection = declared.collection.or(self.collection.take());
        self.views.extend(declared.views);
        self.indexes.extend(declared.indexes);
        if declared.revisions_declared {
            self.revisions = declared.revisions;
        }
        self.resolved = Resolved::default();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table_name(&mut self, table_name: impl Into<String>) -> &mut Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn database_name(&mut self, database_name: impl Into<String>) -> &mut Self {
        self.database_name = Some(database_name.into());
        self
    }

    pub fn view(&mut self, name: impl Into<String>, view: View) -> &mut Self {
        self.views.insert(name.into(), view);
        self
    }

    /// Registers an index to be created by `create_indexes`.
    pub fn index(&mut self, spec: IndexSpec) -> &mut Self {
        self.indexes.push(RegisteredIndex {
            spec,
            created: false,
        });
        self
    }

    pub fn revisions(&mut self, policy: RevisionPolicy) -> &mut Self {
        self.revisions = policy;
        self.revisions_declared = true;
        self
    }

    /// Whether the current thread may use this configuration. Other threads wait until
    /// `declare` has finished.
    fn ready_here(&self) -> bool {
        self.declaring.is_none_or(|owner| owner == thread::current().id())
    }
}

/// Clears the declaring mark even when `declare` panics.
struct Declaring(TypeId);

impl Drop for Declaring {
    fn drop(&mut self) {
        if let Some(mut config) = CONFIGS.get_mut(&self.0) {
            config.declaring = None;
        }
    }
}

/// Inserts the configuration of `M` and runs `M::declare` with no map entry held.
fn declare<M: Model>(key: TypeId) {
    match CONFIGS.entry(key) {
        Entry::Occupied(_) => return,
        Entry::Vacant(vacant) => {
            let mut config = ModelConfig::undeclared::<M>();
            config.declaring = Some(thread::current().id());
            vacant.insert(config);
        }
    }

    let _declaring = Declaring(key);

    let mut declared = ModelConfig::undeclared::<M>();
    declared.views.clear();
    M::declare(&mut declared);

    if let Some(mut config) = CONFIGS.get_mut(&key) {
        config.absorb(declared);
    }
}

/// Runs `f` on the configuration of `M`, creating it if needed.
pub(crate) fn with<M: Model, R>(f: impl FnOnce(&mut ModelConfig) -> R) -> R {
    let key = TypeId::of::<M>();

    let mut config = loop {
        match CONFIGS.get_mut(&key) {
            Some(config) if config.ready_here() => break config,
            Some(config) => {
                drop(config);
                thread::yield_now();
            }
            None => declare::<M>(key),
        }
    };

    f(&mut config)
}

/// Like [`with`], then drops the handles resolved for `M`.
pub(crate) fn rebind<M: Model, R>(f: impl FnOnce(&mut ModelConfig) -> R) -> R {
    with::<M, _>(|config| {
        let result = f(config);
        config.resolved = Resolved::default();
        result
    })
}

/// The view registered under `name`. `defaults` is always available.
pub(crate) fn view<M: Model>(name: &str) -> Result<View> {
    with::<M, _>(|config| config.views.get(name).cloned())
        .or_else(|| (name == DEFAULT_VIEW).then(View::defaults))
        .ok_or_else(|| Error::UnknownView(name.to_owned()))
}

pub(crate) fn defaults() -> Defaults {
    DEFAULTS.read().clone()
}

pub(crate) fn set_defaults(defaults: Defaults) -> Defaults {
    let previous = std::mem::replace(&mut *DEFAULTS.write(), defaults);
    invalidate_all();
    previous
}

/// Drops every cached resolution. Bindings are kept.
pub(crate) fn invalidate_all() {
    for mut config in CONFIGS.iter_mut() {
        config.resolved = Resolved::default();
    }
}

/// The index deployment function of every configured type.
pub(crate) fn configured() -> Vec<(TypeId, fn() -> BoxFuture<'static, Result<()>>)> {
    CONFIGS
        .iter()
        .map(|config| (*config.key(), config.create_indexes))
        .collect()
}
