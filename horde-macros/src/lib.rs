#[warn(clippy::pedantic)]
mod derive_model;
mod prelude;
mod utils;

fn expand<F: FnOnce(proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream>>(
    fun: F,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    fun(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implements `horde::Model` for a newtype over `bson::Document`.
///
/// ```ignore
/// #[derive(Model)]
/// #[model(table = "people", camel_case, versioned, views(public(name, email)))]
/// struct Person(Document);
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn model(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(derive_model::derive_model, input)
}
