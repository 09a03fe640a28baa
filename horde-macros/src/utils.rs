use crate::prelude::*;
use proc_macro_crate::{FoundCrate, crate_name};

macro_rules! extract {
    ($val:expr, $pat:pat, $error_message: expr) => {
        let $pat = $val else {
            return Err(Error::new_spanned($val, $error_message));
        };
    };
}

pub(crate) use extract;

/// The single field of a tuple struct.
pub fn extract_newtype_field(span: Span, data: Data) -> Result<FieldsUnnamed> {
    let Data::Struct(data_struct) = data else {
        return Err(Error::new(span, "expected struct"));
    };

    extract!(
        data_struct.fields,
        Fields::Unnamed(unnamed_fields),
        "expected a tuple struct wrapping a `Document`"
    );

    if unnamed_fields.unnamed.len() != 1 {
        return Err(Error::new_spanned(
            unnamed_fields,
            "expected exactly one field of type `Document`",
        ));
    }

    Ok(unnamed_fields)
}

/// The path to `horde`, also from inside the crate and its tests.
pub fn krate() -> TokenStream {
    match crate_name("horde") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote! { ::#ident }
        }
        Ok(FoundCrate::Itself) | Err(_) => quote! { ::horde },
    }
}
