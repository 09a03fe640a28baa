use crate::{prelude::*, utils::extract_newtype_field};

#[derive(FromAttributes)]
#[darling(attributes(model))]
struct Attributes {
    #[darling(default)]
    table: Option<String>,
    #[darling(default)]
    camel_case: bool,
    #[darling(default)]
    versioned: bool,
    #[darling(default)]
    views: HashMap<Ident, PathList>,
    #[darling(default)]
    setup: Option<Path>,
}

pub fn derive_model(item: TokenStream) -> Result<TokenStream> {
    let input = parse2::<DeriveInput>(item)?;

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "a model cannot be generic",
        ));
    }

    let attributes = Attributes::from_attributes(&input.attrs)?;

    extract_newtype_field(input.span(), input.data)?;

    if attributes.table.as_deref() == Some("") {
        return Err(Error::new(input.ident.span(), "table name cannot be empty"));
    }

    let views = attributes
        .views
        .into_iter()
        .sorted_by_key(|(name, _)| name.to_string())
        .map(|(name, fields)| {
            let fields = fields
                .iter()
                .map(|field| {
                    field
                        .get_ident()
                        .map(|ident| LitStr::new(&ident.to_string(), ident.span()))
                        .ok_or_else(|| Error::new_spanned(field, "expected field name"))
                })
                .try_collect::<_, Vec<_>, _>()?;

            Ok::<_, Error>(ViewConfig { name, fields })
        })
        .try_collect::<_, Vec<_>, _>()?;

    let output = build(
        &input.ident,
        attributes.table.as_deref(),
        attributes.camel_case,
        attributes.versioned,
        &views,
        attributes.setup.as_ref(),
    );

    Ok(output)
}

struct ViewConfig {
    name: Ident,
    fields: Vec<LitStr>,
}

fn build(
    ident: &Ident,
    table: Option<&str>,
    camel_case: bool,
    versioned: bool,
    views: &[ViewConfig],
    setup: Option<&Path>,
) -> TokenStream {
    let krate = krate();

    let name = LitStr::new(&ident.to_string(), ident.span());

    let table_name = match table {
        Some(table) => quote! { ::std::option::Option::Some(#table) },
        None => quote! { ::std::option::Option::None },
    };

    let codec = if camel_case {
        quote! { #krate::FieldCodec::CamelCase }
    } else {
        quote! { #krate::FieldCodec::Identity }
    };

    let view_names = views
        .iter()
        .map(|view| LitStr::new(&view.name.to_string(), view.name.span()));

    let view_fields = views.iter().map(|view| &view.fields);

    let declare = setup.map(|setup| {
        quote! {
            fn declare(config: &mut #krate::ModelConfig) {
                #setup(config);
            }
        }
    });

    quote! {
        impl #krate::Model for #ident {
            const NAME: &'static str = #name;

            const TABLE_NAME: ::std::option::Option<&'static str> = #table_name;

            const CODEC: #krate::FieldCodec = #codec;

            const VERSIONED: bool = #versioned;

            const VIEWS: &'static [(&'static str, &'static [&'static str])] = &[
                #( (#view_names, &[ #( #view_fields ),* ]) ),*
            ];

            fn from_document(document: #krate::bson::Document) -> Self {
                Self(document)
            }

            fn document(&self) -> &#krate::bson::Document {
                &self.0
            }

            fn document_mut(&mut self) -> &mut #krate::bson::Document {
                &mut self.0
            }

            fn into_document(self) -> #krate::bson::Document {
                self.0
            }

            #declare
        }

        impl ::std::convert::From<#krate::bson::Document> for #ident {
            fn from(document: #krate::bson::Document) -> Self {
                Self(document)
            }
        }

        impl ::std::convert::From<#ident> for #krate::bson::Document {
            fn from(model: #ident) -> Self {
                model.0
            }
        }

        #krate::__register_model!(#ident);
    }
}
