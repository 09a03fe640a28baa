//! Every model type known to the process, and index deployment over all of them.
//!
//! Types deriving [`Model`](crate::Model) register themselves at link time when the
//! `meta` feature is enabled. Types implementing the trait by hand can do the same with
//! [`__register_model!`](crate::__register_model). Types that were configured at
//! runtime are covered either way.

use crate::{Model, Result, registry};
use futures_util::future::BoxFuture;
use std::any::TypeId;

#[doc(hidden)]
pub struct ModelMetadataWrapper(pub ModelMetadata);

#[cfg(feature = "meta")]
inventory::collect!(ModelMetadataWrapper);

pub struct ModelMetadata {
    name: &'static str,
    type_id_ptr: fn() -> TypeId,
    create_indexes_ptr: fn() -> BoxFuture<'static, Result<()>>,
}

impl ModelMetadata {
    #[doc(hidden)]
    pub const fn of<M: Model>() -> Self {
        Self {
            name: M::NAME,
            type_id_ptr: TypeId::of::<M>,
            create_indexes_ptr: M::create_indexes,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id_ptr)()
    }

    pub fn create_indexes(&self) -> BoxFuture<'static, Result<()>> {
        (self.create_indexes_ptr)()
    }
}

#[cfg(feature = "meta")]
pub fn model_metadata() -> impl Iterator<Item = &'static ModelMetadata> {
    inventory::iter::<ModelMetadataWrapper>
        .into_iter()
        .map(|wrapper| &wrapper.0)
}

#[cfg(not(feature = "meta"))]
pub fn model_metadata() -> impl Iterator<Item = &'static ModelMetadata> {
    std::iter::empty()
}

/// Creates the registered-but-not-created indexes of every known model type.
///
/// Meant to run once as a deployment step.
pub async fn create_indexes() -> Result<()> {
    let mut seen = vec![];
    let mut deployments = vec![];

    for metadata in model_metadata() {
        let type_id = metadata.type_id();
        if !seen.contains(&type_id) {
            seen.push(type_id);
            deployments.push(metadata.create_indexes_ptr);
        }
    }

    for (type_id, create_indexes) in registry::configured() {
        if !seen.contains(&type_id) {
            seen.push(type_id);
            deployments.push(create_indexes);
        }
    }

    for create_indexes in deployments {
        create_indexes().await?;
    }

    Ok(())
}

#[cfg(feature = "meta")]
#[doc(hidden)]
#[macro_export]
macro_rules! __register_model {
    ($model:ty) => {
        $crate::__private::inventory::submit! {
            $crate::meta::ModelMetadataWrapper($crate::meta::ModelMetadata::of::<$model>())
        }
    };
}

#[cfg(not(feature = "meta"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __register_model {
    ($model:ty) => {};
}
