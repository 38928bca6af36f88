use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod provider_meta;
use provider_meta::{parse_provider_args, validate_name};

/// Registers a `Default + MixerProvider` type under a provider type name so
/// the registry can resolve it without loading a module.
///
/// ```ignore
/// #[derive(Default, RegisterProvider)]
/// #[provider(name = "fancy")]
/// struct FancyProvider;
/// ```
#[proc_macro_derive(RegisterProvider, attributes(provider))]
pub fn derive_register_provider(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).into()
}

fn expand(input: &DeriveInput) -> TokenStream2 {
    let args = match parse_provider_args(input) {
        Ok(args) => args,
        Err(e) => return e.write_errors(),
    };

    let struct_name = &input.ident;
    let lowered = struct_name.to_string().to_lowercase();
    let type_name = args.name.unwrap_or_else(|| lowered.clone());

    if let Err(msg) = validate_name(&type_name) {
        return syn::Error::new(struct_name.span(), msg).to_compile_error();
    }

    let mod_name = syn::Ident::new(
        &format!("__provider_registration_{}", lowered),
        struct_name.span(),
    );

    quote! {
        #[doc(hidden)]
        mod #mod_name {
            use super::*;

            fn entry() -> ::std::boxed::Box<dyn ::mixkit::provider::MixerProvider> {
                ::std::boxed::Box::new(<#struct_name as ::std::default::Default>::default())
            }

            ::inventory::submit! {
                ::mixkit::provider::ProviderRegistration {
                    name: #type_name,
                    entry,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_expansion_uses_explicit_name() {
        let input: DeriveInput = parse_quote! {
            #[provider(name = "fancy")]
            struct FancyProvider;
        };
        let out = expand(&input).to_string();
        assert!(out.contains("__provider_registration_fancyprovider"));
        assert!(out.contains("\"fancy\""));
    }

    #[test]
    fn test_expansion_defaults_to_lowercased_ident() {
        let input: DeriveInput = parse_quote! {
            struct Quiet;
        };
        assert!(expand(&input).to_string().contains("\"quiet\""));
    }

    #[test]
    fn test_invalid_name_becomes_compile_error() {
        let input: DeriveInput = parse_quote! {
            #[provider(name = "bad-name")]
            struct Bad;
        };
        assert!(expand(&input).to_string().contains("compile_error"));
    }
}
